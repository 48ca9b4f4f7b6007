// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query preparation stage of the search pipeline
//!
//! [`SearchPipeline`] is built once at startup with the rewriter to use when
//! a request scope does not bind its own. For every request it resolves the
//! active rewriter, runs it over the request query and decides what to do
//! when the rewriter fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::index::Index;
use crate::query::Query;
use crate::request::SearchRequest;
use crate::rewrite::{resolve_query_rewriter, QueryRewriter, RewriteError, StandardQueryRewriter};
use crate::scope::{DeadlineExceeded, Scope};

/// What the pipeline does when a rewriter returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteErrorPolicy {
    /// Log the failure and execute the original query
    #[default]
    Fallback,
    /// Fail the request
    Abort,
}

/// Query rewriting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Run rewriters at all
    pub enabled: bool,
    /// Handling of rewriter errors
    pub on_error: RewriteErrorPolicy,
    /// Log every applied rewrite at info level instead of debug
    pub log_rewrites: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_error: RewriteErrorPolicy::Fallback,
            log_rewrites: false,
        }
    }
}

impl RewriteConfig {
    /// Execute every query exactly as submitted
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Fail requests whose rewrite fails
    pub fn strict() -> Self {
        Self {
            on_error: RewriteErrorPolicy::Abort,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON document; missing keys take defaults
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Query rewriter '{rewriter}' failed: {source}")]
    Rewrite {
        rewriter: &'static str,
        #[source]
        source: RewriteError,
    },

    #[error("Search deadline exceeded: {0}")]
    DeadlineExceeded(#[from] DeadlineExceeded),

    #[error("Invalid rewrite configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Snapshot of rewrite counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Rewriter invocations
    pub invocations: u64,
    /// Invocations that returned a different query
    pub rewritten: u64,
    /// Failed invocations answered with the original query
    pub fallbacks: u64,
    /// Failed invocations
    pub failures: u64,
}

#[derive(Default)]
struct RewriteCounters {
    invocations: AtomicU64,
    rewritten: AtomicU64,
    fallbacks: AtomicU64,
    failures: AtomicU64,
}

/// Prepares request queries for execution
pub struct SearchPipeline {
    default_rewriter: Arc<dyn QueryRewriter>,
    config: RewriteConfig,
    counters: RewriteCounters,
}

impl SearchPipeline {
    /// Create a pipeline with an explicit default rewriter
    pub fn new(default_rewriter: Arc<dyn QueryRewriter>, config: RewriteConfig) -> Self {
        log::debug!(
            "Search pipeline using default rewriter '{}' ({:?})",
            default_rewriter.name(),
            config
        );
        Self {
            default_rewriter,
            config,
            counters: RewriteCounters::default(),
        }
    }

    /// Pipeline backed by [`StandardQueryRewriter`] with default configuration
    pub fn standard() -> Self {
        Self::new(Arc::new(StandardQueryRewriter::new()), RewriteConfig::default())
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    pub fn default_rewriter(&self) -> &Arc<dyn QueryRewriter> {
        &self.default_rewriter
    }

    /// Produce the query to execute for `request`
    ///
    /// Uses the rewriter bound on `scope`, or the pipeline default when none
    /// is bound.
    pub fn prepare_query(
        &self,
        scope: &Scope,
        index: &dyn Index,
        request: &SearchRequest,
    ) -> Result<Arc<Query>, PipelineError> {
        if !self.config.enabled {
            return Ok(Arc::clone(&request.query));
        }

        scope.check_deadline()?;

        let rewriter = resolve_query_rewriter(scope, &self.default_rewriter);
        self.counters.invocations.fetch_add(1, Ordering::Relaxed);

        match rewriter.rewrite_query(scope, index, request, &request.query) {
            Ok(rewritten) => {
                if !Arc::ptr_eq(&rewritten, &request.query) {
                    self.counters.rewritten.fetch_add(1, Ordering::Relaxed);
                    if self.config.log_rewrites {
                        log::info!(
                            "Rewriter '{}' rewrote {} into {} on index '{}'",
                            rewriter.name(),
                            request.query,
                            rewritten,
                            index.name()
                        );
                    } else {
                        log::debug!(
                            "Rewriter '{}' rewrote {} into {}",
                            rewriter.name(),
                            request.query,
                            rewritten
                        );
                    }
                }
                Ok(rewritten)
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                match self.config.on_error {
                    RewriteErrorPolicy::Fallback => {
                        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                        log::warn!(
                            "Rewriter '{}' failed, executing original query: {}",
                            rewriter.name(),
                            err
                        );
                        Ok(Arc::clone(&request.query))
                    }
                    RewriteErrorPolicy::Abort => Err(PipelineError::Rewrite {
                        rewriter: rewriter.name(),
                        source: err,
                    }),
                }
            }
        }
    }

    pub fn stats(&self) -> RewriteStats {
        RewriteStats {
            invocations: self.counters.invocations.load(Ordering::Relaxed),
            rewritten: self.counters.rewritten.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("default_rewriter", &self.default_rewriter.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BooleanQuery;
    use crate::rewrite::with_query_rewriter;
    use crate::test_support::{init_logging, EmptyIndex};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Remembers every query it was asked to rewrite
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl QueryRewriter for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn rewrite_query(
            &self,
            _scope: &Scope,
            _index: &dyn Index,
            _request: &SearchRequest,
            query: &Arc<Query>,
        ) -> Result<Arc<Query>, RewriteError> {
            self.seen.lock().push(query.to_string());
            Ok(Arc::clone(query))
        }
    }

    struct Broken;

    impl QueryRewriter for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn rewrite_query(
            &self,
            _scope: &Scope,
            _index: &dyn Index,
            _request: &SearchRequest,
            _query: &Arc<Query>,
        ) -> Result<Arc<Query>, RewriteError> {
            Err(RewriteError::msg("index metadata unavailable"))
        }
    }

    /// Fails once the scope deadline has passed
    struct DeadlineAware;

    impl QueryRewriter for DeadlineAware {
        fn name(&self) -> &'static str {
            "deadline_aware"
        }

        fn rewrite_query(
            &self,
            scope: &Scope,
            _index: &dyn Index,
            _request: &SearchRequest,
            query: &Arc<Query>,
        ) -> Result<Arc<Query>, RewriteError> {
            scope.check_deadline()?;
            Ok(Arc::clone(query))
        }
    }

    fn should_only_request() -> SearchRequest {
        SearchRequest::new(BooleanQuery::new().with_should(Query::term("x")))
    }

    #[test]
    fn test_default_rewriter_used_when_none_bound() {
        init_logging();
        let pipeline = SearchPipeline::standard();
        let request = should_only_request();

        let query = pipeline
            .prepare_query(&Scope::root(), &EmptyIndex, &request)
            .unwrap();

        assert_eq!(*query, Query::term("x"));
        assert_eq!(
            pipeline.stats(),
            RewriteStats {
                invocations: 1,
                rewritten: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_bound_rewriter_overrides_default() {
        init_logging();
        let pipeline = SearchPipeline::standard();
        let recording = Arc::new(Recording::default());
        let scope = with_query_rewriter(&Scope::root(), recording.clone());
        let request = should_only_request();

        let query = pipeline
            .prepare_query(&scope, &EmptyIndex, &request)
            .unwrap();

        assert!(Arc::ptr_eq(&query, &request.query));
        assert_eq!(
            recording.seen.lock().as_slice(),
            &[r#"bool(should: term("x"))"#.to_string()]
        );
        assert_eq!(pipeline.stats().rewritten, 0);
    }

    #[test]
    fn test_disabled_pipeline_skips_rewriting() {
        let recording = Arc::new(Recording::default());
        let pipeline = SearchPipeline::new(recording.clone(), RewriteConfig::disabled());
        let request = should_only_request();

        let query = pipeline
            .prepare_query(&Scope::root(), &EmptyIndex, &request)
            .unwrap();

        assert!(Arc::ptr_eq(&query, &request.query));
        assert!(recording.seen.lock().is_empty());
        assert_eq!(pipeline.stats().invocations, 0);
    }

    #[test]
    fn test_failed_rewrite_falls_back_to_original() {
        init_logging();
        let pipeline = SearchPipeline::new(Arc::new(Broken), RewriteConfig::default());
        let request = should_only_request();

        let query = pipeline
            .prepare_query(&Scope::root(), &EmptyIndex, &request)
            .unwrap();

        assert!(Arc::ptr_eq(&query, &request.query));
        let stats = pipeline.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.fallbacks, 1);
    }

    #[test]
    fn test_failed_rewrite_aborts_when_strict() {
        let pipeline = SearchPipeline::new(Arc::new(Broken), RewriteConfig::strict());
        let request = should_only_request();

        let err = pipeline
            .prepare_query(&Scope::root(), &EmptyIndex, &request)
            .unwrap_err();

        match &err {
            PipelineError::Rewrite { rewriter, .. } => assert_eq!(*rewriter, "broken"),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            err.to_string(),
            "Query rewriter 'broken' failed: query rewrite failed: index metadata unavailable"
        );
        assert_eq!(pipeline.stats().fallbacks, 0);
    }

    #[test]
    fn test_expired_scope_is_rejected() {
        let pipeline = SearchPipeline::standard();
        let scope = Scope::root().with_timeout(Duration::ZERO);

        let err = pipeline
            .prepare_query(&scope, &EmptyIndex, &should_only_request())
            .unwrap_err();

        assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
        assert_eq!(pipeline.stats().invocations, 0);
    }

    #[test]
    fn test_expired_scope_never_reaches_bound_rewriter() {
        let pipeline = SearchPipeline::standard();
        assert_eq!(pipeline.config().on_error, RewriteErrorPolicy::Fallback);

        let expired = Scope::root().with_timeout(Duration::ZERO);
        let scope = with_query_rewriter(&expired, Arc::new(DeadlineAware));

        let err = pipeline
            .prepare_query(&scope, &EmptyIndex, &should_only_request())
            .unwrap_err();

        assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
        assert_eq!(pipeline.stats(), RewriteStats::default());
    }

    #[test]
    fn test_pipeline_accessors() {
        let recording: Arc<dyn QueryRewriter> = Arc::new(Recording::default());
        let pipeline = SearchPipeline::new(Arc::clone(&recording), RewriteConfig::strict());

        assert!(Arc::ptr_eq(pipeline.default_rewriter(), &recording));
        assert_eq!(pipeline.default_rewriter().name(), "recording");
        assert_eq!(pipeline.config(), &RewriteConfig::strict());
    }

    #[test]
    fn test_config_from_json() {
        let config = RewriteConfig::from_json(r#"{"on_error":"abort"}"#).unwrap();
        assert_eq!(config, RewriteConfig::strict());

        let config = RewriteConfig::from_json("{}").unwrap();
        assert_eq!(config, RewriteConfig::default());

        let err = RewriteConfig::from_json(r#"{"on_error":"retry"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
