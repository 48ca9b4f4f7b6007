// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Default query rewriter
//!
//! Performs one conservative structural simplification: a boolean query whose
//! only clause is `should` matches exactly what that clause matches, so the
//! wrapper is replaced by its (recursively simplified) `should` sub-query.
//!
//! A clause counts as present whenever it is set. A `must` holding an empty
//! sub-query still blocks the simplification.

use std::sync::Arc;

use super::{QueryRewriter, RewriteError};
use crate::index::Index;
use crate::query::Query;
use crate::request::SearchRequest;
use crate::scope::Scope;

/// Stateless rewriter applying the standard boolean simplification
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardQueryRewriter;

impl StandardQueryRewriter {
    pub fn new() -> Self {
        Self
    }
}

impl QueryRewriter for StandardQueryRewriter {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn rewrite_query(
        &self,
        scope: &Scope,
        index: &dyn Index,
        request: &SearchRequest,
        query: &Arc<Query>,
    ) -> Result<Arc<Query>, RewriteError> {
        log::trace!("Considering rewrite of {}", query);

        if let Query::Boolean(bq) = query.as_ref() {
            if bq.must.is_none() && bq.must_not.is_none() {
                if let Some(should) = &bq.should {
                    log::debug!("Collapsing should-only boolean query into {}", should);
                    return self.rewrite_query(scope, index, request, should);
                }
            }
        }

        Ok(Arc::clone(query))
    }
}
