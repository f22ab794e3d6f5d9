//! Single-predicate metadata filters.

use serde::{Deserialize, Serialize};

use crate::document::{Document, MetadataValue};

/// Comparison applied by a [`MetadataFilter`]. Only equality is supported.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterOperator {
    /// The field's value equals the filter value.
    #[default]
    Equal,
}

/// An equality predicate over one metadata field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    /// The metadata field to compare.
    pub field: String,
    /// The comparison to apply.
    pub operator: FilterOperator,
    /// The value to compare against.
    pub value: String,
}

impl MetadataFilter {
    /// `field == value`.
    pub fn equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), operator: FilterOperator::Equal, value: value.into() }
    }

    /// Evaluate the filter against a document held in process.
    ///
    /// Non-text values are compared through their rendered string form.
    pub fn matches(&self, document: &Document) -> bool {
        match self.operator {
            FilterOperator::Equal => document
                .metadata
                .get(&self.field)
                .and_then(MetadataValue::render)
                .is_some_and(|v| v == self.value),
        }
    }
}
