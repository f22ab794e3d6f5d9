//! Collection naming and the storage descriptor persisted with a dataset.

use serde::{Deserialize, Serialize};

/// Suffix every collection name carries.
pub const COLLECTION_MARKER: &str = "_Node";

/// Prefix for names generated from a dataset id.
pub const GENERATED_PREFIX: &str = "Vector_index_";

/// The part of a dataset an adapter needs to find its collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    /// Unique dataset id, usually a hyphenated UUID.
    pub id: String,
    /// Storage descriptor saved when the dataset was first indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_struct: Option<IndexStruct>,
}

impl Dataset {
    /// A dataset that has not been indexed yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), index_struct: None }
    }

    /// Attach a previously persisted storage descriptor.
    pub fn with_index_struct(mut self, index_struct: IndexStruct) -> Self {
        self.index_struct = Some(index_struct);
        self
    }
}

/// Which backend holds a dataset's vectors and under what collection name.
///
/// Serializes as `{"type": "...", "vector_store": {"class_prefix": "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStruct {
    /// Backend identifier, e.g. `weaviate`.
    #[serde(rename = "type")]
    pub store_type: String,
    /// Backend-specific location.
    pub vector_store: StoreLocation,
}

/// Location of a collection inside a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreLocation {
    /// Collection (class) name.
    pub class_prefix: String,
}

impl IndexStruct {
    /// Build a descriptor for `collection` stored in `store_type`.
    pub fn new(store_type: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            vector_store: StoreLocation { class_prefix: collection.into() },
        }
    }
}

/// Derive the collection name for a dataset.
///
/// A stored `class_prefix` wins and gets the marker appended when missing;
/// otherwise the name is generated from the dataset id with hyphens
/// replaced by underscores.
pub fn collection_name(dataset: &Dataset) -> String {
    match &dataset.index_struct {
        Some(index_struct) => with_marker(&index_struct.vector_store.class_prefix),
        None => format!("{GENERATED_PREFIX}{}{COLLECTION_MARKER}", dataset.id.replace('-', "_")),
    }
}

/// Append [`COLLECTION_MARKER`] unless `name` already ends with it.
pub fn with_marker(name: &str) -> String {
    if name.ends_with(COLLECTION_MARKER) {
        name.to_string()
    } else {
        format!("{name}{COLLECTION_MARKER}")
    }
}
