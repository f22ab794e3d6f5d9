//! Backend selection.
//!
//! [`create_vector_store`] picks the [`VectorStore`] implementation named by
//! [`VectorStoreConfig::vector_type`] and binds it to the dataset's collection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::VectorStoreConfig;
use crate::error::{Result, VdbError};
use crate::inmemory::InMemoryVectorStore;
use crate::naming::{Dataset, collection_name};
use crate::vectorstore::VectorStore;

/// Metadata properties returned with every row unless the caller asks otherwise.
pub const DEFAULT_ATTRIBUTES: [&str; 4] = ["doc_id", "dataset_id", "document_id", "doc_hash"];

/// The default attribute list as owned strings.
pub fn default_attributes() -> Vec<String> {
    DEFAULT_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
}

/// Supported vector store backends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VectorType {
    /// Weaviate over its REST and GraphQL APIs.
    #[default]
    Weaviate,
    /// Process-local store for development and tests.
    InMemory,
}

impl VectorType {
    /// The identifier persisted in storage descriptors.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorType::Weaviate => "weaviate",
            VectorType::InMemory => "in_memory",
        }
    }

    /// Whether the backend is reached over the network and needs an endpoint.
    pub fn is_remote(&self) -> bool {
        matches!(self, VectorType::Weaviate)
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorType {
    type Err = VdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weaviate" => Ok(VectorType::Weaviate),
            "in_memory" | "inmemory" | "memory" => Ok(VectorType::InMemory),
            other => Err(VdbError::ConfigError(format!("unsupported vector store type: {other}"))),
        }
    }
}

/// Construct the configured backend bound to `dataset`'s collection.
///
/// `attributes` lists the metadata properties returned with search rows.
///
/// # Errors
///
/// Returns [`VdbError::ConfigError`] if the configuration is invalid or the
/// backend was compiled out.
pub fn create_vector_store(
    config: &VectorStoreConfig,
    dataset: &Dataset,
    attributes: Vec<String>,
) -> Result<Arc<dyn VectorStore>> {
    config.validate()?;
    let collection = collection_name(dataset);
    info!(backend = %config.vector_type, collection = %collection, "creating vector store");

    match config.vector_type {
        VectorType::InMemory => {
            Ok(Arc::new(InMemoryVectorStore::with_config(collection, config.clone())))
        }
        #[cfg(feature = "weaviate")]
        VectorType::Weaviate => Ok(Arc::new(crate::weaviate::WeaviateVectorStore::new(
            collection, config, attributes,
        )?)),
        #[cfg(not(feature = "weaviate"))]
        VectorType::Weaviate => {
            let _ = attributes;
            Err(VdbError::ConfigError(
                "the weaviate backend requires the `weaviate` feature".to_string(),
            ))
        }
    }
}
