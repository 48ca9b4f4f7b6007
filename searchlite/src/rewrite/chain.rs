// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Ordered composition of query rewriters
//!
//! Rewriters run in registration order, each one receiving the previous
//! output. A pass that hands back the same query node it was given counts as
//! unchanged; with `max_passes > 1` the chain repeats until a pass leaves the
//! query unchanged or the pass limit is hit.

use std::fmt;
use std::sync::Arc;

use super::{QueryRewriter, RewriteError};
use crate::index::Index;
use crate::query::Query;
use crate::request::SearchRequest;
use crate::scope::Scope;

/// Runs a list of rewriters one after another
pub struct ChainedQueryRewriter {
    rewriters: Vec<Arc<dyn QueryRewriter>>,
    max_passes: usize,
}

impl ChainedQueryRewriter {
    /// Create a chain that runs each rewriter once
    pub fn new(rewriters: Vec<Arc<dyn QueryRewriter>>) -> Self {
        Self {
            rewriters,
            max_passes: 1,
        }
    }

    /// Repeat the chain up to `max_passes` times (at least once)
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Append a rewriter to the end of the chain
    pub fn push(&mut self, rewriter: Arc<dyn QueryRewriter>) {
        self.rewriters.push(rewriter);
    }

    pub fn len(&self) -> usize {
        self.rewriters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }
}

impl fmt::Debug for ChainedQueryRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.rewriters.iter().map(|r| r.name()).collect();
        f.debug_struct("ChainedQueryRewriter")
            .field("rewriters", &names)
            .field("max_passes", &self.max_passes)
            .finish()
    }
}

impl QueryRewriter for ChainedQueryRewriter {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn rewrite_query(
        &self,
        scope: &Scope,
        index: &dyn Index,
        request: &SearchRequest,
        query: &Arc<Query>,
    ) -> Result<Arc<Query>, RewriteError> {
        let mut current = Arc::clone(query);

        for pass in 1..=self.max_passes {
            let mut changed = false;

            for rewriter in &self.rewriters {
                let next = rewriter.rewrite_query(scope, index, request, &current)?;
                if !Arc::ptr_eq(&next, &current) {
                    log::debug!("Rewriter '{}' changed query in pass {}", rewriter.name(), pass);
                    changed = true;
                    current = next;
                }
            }

            if !changed {
                log::trace!("No rewriter changed the query in pass {}, stopping", pass);
                break;
            }
        }

        Ok(current)
    }
}
