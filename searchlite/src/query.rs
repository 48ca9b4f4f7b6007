// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Full-text search query tree
//!
//! Queries are immutable once built. Sub-queries are shared through `Arc`, so
//! a rewrite can hand back the exact input node or build a new tree that
//! reuses every subtree it did not touch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A node of a search query tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Must / must-not / should composite
    Boolean(BooleanQuery),
    /// Exact term lookup, no analysis
    Term(TermQuery),
    /// Analyzed text match
    Match(MatchQuery),
    /// Analyzed phrase match
    MatchPhrase(MatchPhraseQuery),
    /// Term prefix match
    Prefix(PrefixQuery),
    /// Edit-distance term match
    Fuzzy(FuzzyQuery),
    /// All sub-queries must match
    Conjunction(ConjunctionQuery),
    /// At least `min` sub-queries must match
    Disjunction(DisjunctionQuery),
    /// Matches every document
    MatchAll,
    /// Matches no document
    MatchNone,
}

/// Boolean composite of optional sub-queries
///
/// A clause counts as present whenever it is `Some`, even if the sub-query it
/// holds has no clauses of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
    /// AND
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must: Option<Arc<Query>>,
    /// AND NOT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not: Option<Arc<Query>>,
    /// OR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should: Option<Arc<Query>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl BooleanQuery {
    /// Create an empty boolean query
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_must(mut self, query: impl Into<Arc<Query>>) -> Self {
        self.must = Some(query.into());
        self
    }

    pub fn with_must_not(mut self, query: impl Into<Arc<Query>>) -> Self {
        self.must_not = Some(query.into());
        self
    }

    pub fn with_should(mut self, query: impl Into<Arc<Query>>) -> Self {
        self.should = Some(query.into());
        self
    }

    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Iterate over the clauses that are set
    pub fn clauses(&self) -> impl Iterator<Item = &Arc<Query>> {
        self.must
            .iter()
            .chain(self.must_not.iter())
            .chain(self.should.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    #[serde(rename = "match")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Analyzer name; the index default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPhraseQuery {
    #[serde(rename = "match_phrase")]
    pub phrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyQuery {
    pub term: String,
    /// Maximum edit distance
    #[serde(default = "default_fuzziness")]
    pub fuzziness: u8,
    /// Number of leading characters that must match exactly
    #[serde(default)]
    pub prefix_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

fn default_fuzziness() -> u8 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionQuery {
    pub conjuncts: Vec<Arc<Query>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisjunctionQuery {
    pub disjuncts: Vec<Arc<Query>>,
    /// Minimum number of disjuncts that must match
    #[serde(default = "default_min")]
    pub min: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl Default for DisjunctionQuery {
    fn default() -> Self {
        Self {
            disjuncts: Vec::new(),
            min: default_min(),
            boost: None,
        }
    }
}

fn default_min() -> usize {
    1
}

impl Query {
    /// Exact term query against the default field
    pub fn term(term: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            term: term.into(),
            field: None,
            boost: None,
        })
    }

    /// Exact term query against a named field
    pub fn field_term(field: impl Into<String>, term: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            term: term.into(),
            field: Some(field.into()),
            boost: None,
        })
    }

    pub fn match_text(text: impl Into<String>) -> Self {
        Query::Match(MatchQuery {
            text: text.into(),
            field: None,
            analyzer: None,
            boost: None,
        })
    }

    pub fn match_phrase(phrase: impl Into<String>) -> Self {
        Query::MatchPhrase(MatchPhraseQuery {
            phrase: phrase.into(),
            field: None,
            analyzer: None,
            boost: None,
        })
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Query::Prefix(PrefixQuery {
            prefix: prefix.into(),
            field: None,
            boost: None,
        })
    }

    pub fn fuzzy(term: impl Into<String>, fuzziness: u8) -> Self {
        Query::Fuzzy(FuzzyQuery {
            term: term.into(),
            fuzziness,
            prefix_length: 0,
            field: None,
            boost: None,
        })
    }

    pub fn conjunction(conjuncts: Vec<Arc<Query>>) -> Self {
        Query::Conjunction(ConjunctionQuery {
            conjuncts,
            boost: None,
        })
    }

    pub fn disjunction(disjuncts: Vec<Arc<Query>>) -> Self {
        Query::Disjunction(DisjunctionQuery {
            disjuncts,
            ..Default::default()
        })
    }

    /// Borrow the boolean composite, if this is one
    pub fn as_boolean(&self) -> Option<&BooleanQuery> {
        match self {
            Query::Boolean(bq) => Some(bq),
            _ => None,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.as_boolean().is_some()
    }

    /// Direct sub-queries of this node
    pub fn children(&self) -> Vec<&Arc<Query>> {
        match self {
            Query::Boolean(bq) => bq.clauses().collect(),
            Query::Conjunction(cq) => cq.conjuncts.iter().collect(),
            Query::Disjunction(dq) => dq.disjuncts.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Height of the tree rooted at this node; a leaf has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(|child| child.depth())
            .max()
            .unwrap_or(0)
    }

    /// Parse a query from its JSON form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<BooleanQuery> for Query {
    fn from(bq: BooleanQuery) -> Self {
        Query::Boolean(bq)
    }
}

impl From<BooleanQuery> for Arc<Query> {
    fn from(bq: BooleanQuery) -> Self {
        Arc::new(Query::Boolean(bq))
    }
}

fn write_leaf(
    f: &mut fmt::Formatter<'_>,
    kind: &str,
    field: &Option<String>,
    value: &str,
) -> fmt::Result {
    match field {
        Some(field) => write!(f, "{}({}:{:?})", kind, field, value),
        None => write!(f, "{}({:?})", kind, value),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, queries: &[Arc<Query>]) -> fmt::Result {
    for (i, query) in queries.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", query)?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Boolean(bq) => {
                write!(f, "bool(")?;
                let mut first = true;
                for (label, clause) in [
                    ("must", &bq.must),
                    ("must_not", &bq.must_not),
                    ("should", &bq.should),
                ] {
                    if let Some(clause) = clause {
                        if !first {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {}", label, clause)?;
                        first = false;
                    }
                }
                write!(f, ")")
            }
            Query::Term(q) => write_leaf(f, "term", &q.field, &q.term),
            Query::Match(q) => write_leaf(f, "match", &q.field, &q.text),
            Query::MatchPhrase(q) => write_leaf(f, "phrase", &q.field, &q.phrase),
            Query::Prefix(q) => write_leaf(f, "prefix", &q.field, &q.prefix),
            Query::Fuzzy(q) => {
                write_leaf(f, "fuzzy", &q.field, &q.term)?;
                write!(f, "~{}", q.fuzziness)
            }
            Query::Conjunction(q) => {
                write!(f, "and(")?;
                write_list(f, &q.conjuncts)?;
                write!(f, ")")
            }
            Query::Disjunction(q) => {
                write!(f, "or[min={}](", q.min)?;
                write_list(f, &q.disjuncts)?;
                write!(f, ")")
            }
            Query::MatchAll => write!(f, "match_all"),
            Query::MatchNone => write!(f, "match_none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_builder_sets_clauses() {
        let bq = BooleanQuery::new()
            .with_must(Query::term("a"))
            .with_should(Query::term("b"));

        assert!(bq.must.is_some());
        assert!(bq.must_not.is_none());
        assert!(bq.should.is_some());
        assert_eq!(bq.clauses().count(), 2);
    }

    #[test]
    fn test_empty_boolean_is_still_boolean() {
        let query: Query = BooleanQuery::new().into();
        assert!(query.is_boolean());
        assert!(query.children().is_empty());
        assert_eq!(query.depth(), 1);
    }

    #[test]
    fn test_depth() {
        let inner: Query = BooleanQuery::new().with_should(Query::term("x")).into();
        let outer: Query = BooleanQuery::new().with_should(inner).into();
        assert_eq!(outer.depth(), 3);
        assert_eq!(Query::term("x").depth(), 1);
    }

    #[test]
    fn test_boolean_boost_in_json() {
        let query: Query = BooleanQuery::new()
            .with_should(Query::match_phrase("quick fox"))
            .with_boost(2.0)
            .into();

        assert_eq!(
            query.to_json().unwrap(),
            r#"{"boolean":{"should":{"match_phrase":{"match_phrase":"quick fox"}},"boost":2.0}}"#
        );
        assert_eq!(query.to_string(), r#"bool(should: phrase("quick fox"))"#);
    }

    #[test]
    fn test_display() {
        let query: Query = BooleanQuery::new()
            .with_must(Query::field_term("title", "rust"))
            .with_should(Query::disjunction(vec![
                Arc::new(Query::term("a")),
                Arc::new(Query::prefix("b")),
            ]))
            .into();

        assert_eq!(
            query.to_string(),
            r#"bool(must: term(title:"rust"), should: or[min=1](term("a"), prefix("b")))"#
        );
        assert_eq!(Query::fuzzy("helo", 2).to_string(), r#"fuzzy("helo")~2"#);
        assert_eq!(Query::MatchAll.to_string(), "match_all");
    }

    #[test]
    fn test_json_form() {
        let query: Query = BooleanQuery::new().with_should(Query::term("x")).into();
        let json = query.to_json().unwrap();
        assert_eq!(json, r#"{"boolean":{"should":{"term":{"term":"x"}}}}"#);

        let parsed = Query::from_json(&json).unwrap();
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_json_defaults() {
        let parsed = Query::from_json(r#"{"fuzzy":{"term":"helo"}}"#).unwrap();
        match parsed {
            Query::Fuzzy(q) => {
                assert_eq!(q.fuzziness, 1);
                assert_eq!(q.prefix_length, 0);
            }
            other => panic!("unexpected query: {}", other),
        }

        let parsed = Query::from_json(r#""match_all""#).unwrap();
        assert_eq!(parsed, Query::MatchAll);
    }
}
