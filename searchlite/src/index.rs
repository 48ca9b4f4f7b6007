// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-only index handle exposed to query rewriters

use serde::{Deserialize, Serialize};

/// Summary information about an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Index name
    pub name: String,
    /// Number of live documents
    pub document_count: u64,
    /// Indexed field names
    pub fields: Vec<String>,
}

/// Handle onto a searchable index
///
/// Only inspection is offered here; rewriters consult it for metadata and
/// never modify it.
pub trait Index: Send + Sync {
    /// Index name
    fn name(&self) -> &str;

    /// Current index metadata
    fn metadata(&self) -> IndexMetadata;

    /// Whether a field is indexed
    fn has_field(&self, field: &str) -> bool {
        self.metadata().fields.iter().any(|f| f == field)
    }
}
