// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Search request passed through the query pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::query::Query;

/// A complete incoming search request
///
/// Rewriters receive the request read-only; the query they rewrite is the
/// one carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Arc<Query>,
    /// Maximum number of hits to return
    #[serde(default = "default_size")]
    pub size: usize,
    /// Number of hits to skip
    #[serde(default)]
    pub from: usize,
    /// Stored fields to load for each hit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Include scoring explanations
    #[serde(default)]
    pub explain: bool,
}

fn default_size() -> usize {
    10
}

impl SearchRequest {
    /// Create a request for the first page of hits
    pub fn new(query: impl Into<Arc<Query>>) -> Self {
        Self {
            query: query.into(),
            size: default_size(),
            from: 0,
            fields: Vec::new(),
            explain: false,
        }
    }

    pub fn with_page(mut self, size: usize, from: usize) -> Self {
        self.size = size;
        self.from = from;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
