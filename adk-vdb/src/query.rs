//! Options for vector and full-text searches.

use serde::{Deserialize, Serialize};

use crate::filter::MetadataFilter;

/// Default number of rows returned by a vector search.
pub const DEFAULT_VECTOR_LIMIT: usize = 4;

/// Default number of rows returned by a full-text search.
pub const DEFAULT_FULL_TEXT_LIMIT: usize = 2;

/// Options for [`VectorStore::search_by_vector`](crate::VectorStore::search_by_vector).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorQuery {
    /// Optional equality filter intersected with the nearest-neighbour query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    /// Maximum number of rows requested from the backend.
    pub limit: usize,
    /// Maximum distance a row may have. `0.0` disables the threshold.
    ///
    /// A row passes when its distance is strictly below the threshold.
    pub score_threshold: f32,
}

impl Default for VectorQuery {
    fn default() -> Self {
        Self { filter: None, limit: DEFAULT_VECTOR_LIMIT, score_threshold: 0.0 }
    }
}

impl VectorQuery {
    /// Options with the defaults (`limit = 4`, no threshold, no filter).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to rows matching `filter`.
    pub fn filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the maximum number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the distance threshold.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }
}

/// Options for [`VectorStore::search_by_full_text`](crate::VectorStore::search_by_full_text).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FullTextQuery {
    /// Optional equality filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    /// Extra backend-computed fields to request with each row, passed
    /// through to the result metadata unmodified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<String>,
    /// Maximum number of rows requested from the backend.
    pub limit: usize,
}

impl Default for FullTextQuery {
    fn default() -> Self {
        Self { filter: None, additional: Vec::new(), limit: DEFAULT_FULL_TEXT_LIMIT }
    }
}

impl FullTextQuery {
    /// Options with the defaults (`limit = 2`, no filter, no extra fields).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to rows matching `filter`.
    pub fn filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request an extra backend field with each row.
    pub fn additional(mut self, field: impl Into<String>) -> Self {
        self.additional.push(field.into());
        self
    }

    /// Set the maximum number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}
