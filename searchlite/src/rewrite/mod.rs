// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pluggable query rewriting
//!
//! A [`QueryRewriter`] gets one chance to replace a parsed query before the
//! search pipeline executes it. Callers attach a rewriter to a request's
//! [`Scope`] with [`with_query_rewriter`]; the pipeline resolves it with
//! [`query_rewriter`] and falls back to the default it was started with when
//! nothing is bound.
//!
//! Rewriters only read their inputs. They return either the input query
//! itself or a newly built replacement.

pub mod chain;
pub mod standard;

pub use chain::ChainedQueryRewriter;
pub use standard::StandardQueryRewriter;

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

use crate::index::Index;
use crate::query::Query;
use crate::request::SearchRequest;
use crate::scope::{DeadlineExceeded, Scope, ScopeKey};

/// Failure reported by a query rewriter
///
/// The cause is whatever the rewriter implementation reports. A caller that
/// receives an error must not use any query from that call.
#[derive(Error, Debug)]
#[error("query rewrite failed: {source}")]
pub struct RewriteError {
    source: Box<dyn StdError + Send + Sync>,
}

impl RewriteError {
    /// Wrap an implementation-specific error
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Error carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    /// Downcast the underlying cause
    pub fn cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }
}

impl From<DeadlineExceeded> for RewriteError {
    fn from(err: DeadlineExceeded) -> Self {
        Self::new(err)
    }
}

/// Query optimization hook run before a query is executed
///
/// Implementations must treat every argument as read-only. Implementations
/// holding mutable state synchronize it themselves.
pub trait QueryRewriter: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &'static str {
        "custom"
    }

    /// Return the query to execute in place of `query`
    fn rewrite_query(
        &self,
        scope: &Scope,
        index: &dyn Index,
        request: &SearchRequest,
        query: &Arc<Query>,
    ) -> Result<Arc<Query>, RewriteError>;
}

struct RewriterKey;

impl ScopeKey for RewriterKey {
    type Value = Arc<dyn QueryRewriter>;
}

/// Derive a scope on which `rewriter` is the active query rewriter
pub fn with_query_rewriter(parent: &Scope, rewriter: Arc<dyn QueryRewriter>) -> Scope {
    parent.with_value::<RewriterKey>(rewriter)
}

/// Rewriter bound nearest to `scope`, or `None` if none was ever bound
pub fn query_rewriter(scope: &Scope) -> Option<Arc<dyn QueryRewriter>> {
    scope.value::<RewriterKey>().cloned()
}

/// Rewriter bound on `scope`, falling back to `default`
pub fn resolve_query_rewriter(
    scope: &Scope,
    default: &Arc<dyn QueryRewriter>,
) -> Arc<dyn QueryRewriter> {
    query_rewriter(scope).unwrap_or_else(|| Arc::clone(default))
}
