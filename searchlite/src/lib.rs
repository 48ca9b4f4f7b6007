// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SearchLite - pluggable query rewriting for full-text search
//!
//! A search pipeline hands every parsed query to a [`QueryRewriter`] before
//! executing it. Callers choose the rewriter per request by binding it on the
//! request's [`Scope`]; requests without a binding use the default the
//! [`SearchPipeline`] was built with, normally the [`StandardQueryRewriter`].
//!
//! # Module Organization
//!
//! - [`query`] - Query tree
//! - [`request`] - Search request
//! - [`index`] - Read-only index handle
//! - [`scope`] - Immutable request-scoped environment
//! - [`rewrite`] - Rewriter trait, scope binding and bundled rewriters
//! - [`pipeline`] - Query preparation stage and its configuration

pub mod index;
pub mod pipeline;
pub mod query;
pub mod request;
pub mod rewrite;
pub mod scope;

pub use index::{Index, IndexMetadata};
pub use pipeline::{PipelineError, RewriteConfig, RewriteErrorPolicy, RewriteStats, SearchPipeline};
pub use query::{BooleanQuery, Query};
pub use request::SearchRequest;
pub use rewrite::{
    query_rewriter, resolve_query_rewriter, with_query_rewriter, ChainedQueryRewriter,
    QueryRewriter, RewriteError, StandardQueryRewriter,
};
pub use scope::{DeadlineExceeded, Scope, ScopeKey};
