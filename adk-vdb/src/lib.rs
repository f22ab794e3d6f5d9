//! Pluggable vector store adapters for ADK-Rust retrieval pipelines.
//!
//! This crate provides:
//! - The [`VectorStore`] adapter contract: collection lifecycle, batched
//!   upserts, metadata deletes, vector search with distance thresholds and
//!   BM25 full-text search
//! - Deterministic identities derived from `doc_id` ([`identity`])
//! - A backend-agnostic [`BatchWriter`] with per-item retries and dynamic
//!   batch sizing
//! - Backends: [`InMemoryVectorStore`] and, with the `weaviate` feature,
//!   [`weaviate::WeaviateVectorStore`]
//! - Backend selection from configuration ([`create_vector_store`])
//!
//! # Feature Flags
//!
//! - `weaviate` (default): Weaviate over REST and GraphQL
//! - `full`: every backend

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod factory;
pub mod filter;
pub mod identity;
pub mod inmemory;
pub mod naming;
pub mod query;
pub mod vectorstore;

#[cfg(feature = "weaviate")]
pub mod weaviate;

pub use batch::{BatchPolicy, BatchSink, BatchWriter, ItemOutcome, StoredEntry};
pub use config::{VectorStoreConfig, VectorStoreConfigBuilder};
pub use document::{DOC_ID_KEY, Document, MetadataValue, SCORE_KEY, SearchResult};
pub use error::{Result, VdbError};
pub use factory::{DEFAULT_ATTRIBUTES, VectorType, create_vector_store, default_attributes};
pub use filter::{FilterOperator, MetadataFilter};
pub use identity::{assign_id, id_for_doc_id};
pub use inmemory::InMemoryVectorStore;
pub use naming::{Dataset, IndexStruct, collection_name};
pub use query::{FullTextQuery, VectorQuery};
pub use vectorstore::VectorStore;
