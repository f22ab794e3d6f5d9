//! Weaviate vector store backend.
//!
//! Provides [`WeaviateVectorStore`] which implements [`VectorStore`] over
//! Weaviate's REST API (schema, batch, objects) and GraphQL `Get` queries,
//! using [reqwest](https://docs.rs/reqwest).
//!
//! Each collection is a Weaviate class with a single `text` property; other
//! metadata is stored as auto-schema properties. Searches return `text` plus
//! the configured attribute list.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_vdb::weaviate::WeaviateVectorStore;
//! use adk_vdb::{VectorQuery, VectorStore, VectorStoreConfig, default_attributes};
//!
//! let config = VectorStoreConfig::builder().endpoint("http://localhost:8080").build()?;
//! let store = WeaviateVectorStore::connect("Docs_Node", &config, default_attributes()).await?;
//! store.create_collection(&documents, Some(&embeddings)).await?;
//! let results = store.search_by_vector(&query_embedding, &VectorQuery::new()).await?;
//! ```

mod client;
mod graphql;
mod mapper;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::batch::{BatchPolicy, BatchSink, BatchWriter, ItemOutcome, StoredEntry};
use crate::config::VectorStoreConfig;
use crate::document::{DOC_ID_KEY, Document, SearchResult};
use crate::error::{Result, VdbError};
use crate::factory::VectorType;
use crate::filter::MetadataFilter;
use crate::query::{FullTextQuery, VectorQuery};
use crate::vectorstore::{VectorStore, check_vectors, retain_within_threshold};

use client::{BACKEND, BatchObject, WeaviateClient};
use graphql::{GetQuery, is_valid_class, is_valid_name, where_json};

/// Property that holds the document text.
pub const TEXT_KEY: &str = "text";

/// A [`VectorStore`] backed by [Weaviate](https://weaviate.io/).
///
/// Holds one HTTP client for its lifetime. Batch size, retry bound and
/// dynamic batching come from the [`VectorStoreConfig`] it was built with.
pub struct WeaviateVectorStore {
    client: WeaviateClient,
    collection: String,
    attributes: Vec<String>,
    policy: BatchPolicy,
}

impl WeaviateVectorStore {
    /// Create a store for `collection` without contacting the server.
    ///
    /// `attributes` lists the metadata properties returned with search rows.
    ///
    /// # Errors
    ///
    /// Returns [`VdbError::ConfigError`] if the configuration is invalid,
    /// the collection is not a valid class name, or an attribute is not a
    /// valid property name.
    pub fn new(
        collection: impl Into<String>,
        config: &VectorStoreConfig,
        attributes: Vec<String>,
    ) -> Result<Self> {
        config.validate()?;
        let collection = collection.into();
        if !is_valid_class(&collection) {
            return Err(VdbError::ConfigError(format!(
                "'{collection}' is not a valid weaviate class name"
            )));
        }
        if let Some(bad) = attributes.iter().find(|a| !is_valid_name(a)) {
            return Err(VdbError::ConfigError(format!("'{bad}' is not a valid property name")));
        }

        let client = WeaviateClient::new(config)?;
        Ok(Self { client, collection, attributes, policy: BatchPolicy::from_config(config) })
    }

    /// Create a store and check that the server is reachable and ready.
    ///
    /// # Errors
    ///
    /// Returns [`VdbError::ConfigError`] as [`new`](Self::new) does, and
    /// [`VdbError::ConnectionError`] if the server cannot be reached.
    pub async fn connect(
        collection: impl Into<String>,
        config: &VectorStoreConfig,
        attributes: Vec<String>,
    ) -> Result<Self> {
        let store = Self::new(collection, config, attributes)?;
        store.client.ready().await?;
        info!(collection = %store.collection, endpoint = %config.endpoint, "connected to weaviate");
        Ok(store)
    }

    /// Replace the batch policy.
    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The class definition created for a new collection.
    pub fn default_schema(&self) -> Value {
        json!({
            "class": self.collection,
            "properties": [
                { "name": TEXT_KEY, "dataType": ["text"] }
            ],
        })
    }

    fn selected_fields(&self) -> Vec<String> {
        let mut fields = vec![TEXT_KEY.to_string()];
        fields.extend(self.attributes.iter().filter(|a| a.as_str() != TEXT_KEY).cloned());
        fields
    }
}

#[async_trait]
impl BatchSink for WeaviateVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn write_batch(&self, entries: &[&StoredEntry]) -> Result<Vec<ItemOutcome>> {
        let objects = entries
            .iter()
            .map(|entry| {
                let mut properties = entry.properties.clone();
                properties.insert(TEXT_KEY.to_string(), Value::String(entry.text.clone()));
                BatchObject {
                    class: &self.collection,
                    id: entry.id.to_string(),
                    properties,
                    vector: entry.vector.as_deref(),
                }
            })
            .collect();

        let results = self.client.batch_objects(objects).await?;
        if results.len() != entries.len() {
            return Err(VdbError::MalformedResponse {
                backend: BACKEND.to_string(),
                message: format!("{} results for {} objects", results.len(), entries.len()),
            });
        }

        entries
            .iter()
            .zip(results)
            .map(|(entry, result)| {
                if let Some(id) = &result.id {
                    if *id != entry.id.to_string() {
                        return Err(VdbError::MalformedResponse {
                            backend: BACKEND.to_string(),
                            message: format!("expected result for {} but got {id}", entry.id),
                        });
                    }
                }
                let failure =
                    result.result.and_then(|r| r.errors).and_then(|errors| errors.joined());
                Ok(match failure {
                    Some(message) => ItemOutcome::Failed(message),
                    None => ItemOutcome::Written,
                })
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for WeaviateVectorStore {
    fn store_type(&self) -> VectorType {
        VectorType::Weaviate
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self.client.class_exists(&self.collection).await? {
            debug!(
                collection = %self.collection,
                "weaviate class already exists, skipping creation"
            );
            return Ok(());
        }
        self.client.create_class(&self.default_schema()).await?;
        info!(collection = %self.collection, "created weaviate class");
        Ok(())
    }

    async fn upsert(
        &self,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>> {
        check_vectors(documents, vectors)?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let entries = StoredEntry::prepare(documents, vectors);
        let ids = BatchWriter::new(self, self.policy.clone()).write(&entries).await?;
        debug!(collection = %self.collection, count = ids.len(), "upserted documents to weaviate");
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        let mut deleted = 0usize;
        // Ids that are not UUIDs cannot name a stored object.
        for id in ids.iter().filter_map(|id| Uuid::parse_str(id).ok()) {
            if self.client.delete_object(&self.collection, &id).await? {
                deleted += 1;
            }
        }
        debug!(
            collection = %self.collection,
            requested = ids.len(),
            deleted,
            "deleted weaviate objects"
        );
        Ok(())
    }

    async fn delete_by_metadata_field(&self, field: &str, value: &str) -> Result<()> {
        let filter = MetadataFilter::equal(field, value);
        let matches = self.client.batch_delete(&self.collection, where_json(&filter)).await?;
        debug!(
            collection = %self.collection,
            field,
            matches,
            "deleted weaviate objects by metadata"
        );
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        self.client.delete_class(&self.collection).await?;
        info!(collection = %self.collection, "dropped weaviate class");
        Ok(())
    }

    async fn exists(&self, doc_id: &str) -> Result<bool> {
        let filter = MetadataFilter::equal(DOC_ID_KEY, doc_id);
        let query =
            GetQuery::new(&self.collection).filter(Some(&filter)).limit(1).additional(["id"]);
        let data = self.client.graphql(&query.build()).await?;
        Ok(!mapper::rows(data, &self.collection)?.is_empty())
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        query: &VectorQuery,
    ) -> Result<Vec<SearchResult>> {
        let graphql = GetQuery::new(&self.collection)
            .near_vector(vector)?
            .filter(query.filter.as_ref())
            .limit(query.limit)
            .fields(self.selected_fields())
            .additional(["id", "distance"])
            .build();

        let data = self.client.graphql(&graphql).await?;
        let results = mapper::rows(data, &self.collection)?
            .into_iter()
            .map(mapper::to_search_result)
            .collect::<Result<Vec<_>>>()?;

        let results = retain_within_threshold(results, query.score_threshold);
        debug!(collection = %self.collection, count = results.len(), "weaviate vector search");
        Ok(results)
    }

    async fn search_by_full_text(
        &self,
        text: &str,
        query: &FullTextQuery,
    ) -> Result<Vec<Document>> {
        if let Some(bad) = query.additional.iter().find(|f| !is_valid_name(f)) {
            return Err(VdbError::InvalidInput(format!("'{bad}' is not a valid additional field")));
        }
        let graphql = GetQuery::new(&self.collection)
            .bm25(text, &[TEXT_KEY])
            .filter(query.filter.as_ref())
            .limit(query.limit)
            .fields(self.selected_fields())
            .additional(query.additional.iter().cloned())
            .build();

        let data = self.client.graphql(&graphql).await?;
        let documents = mapper::rows(data, &self.collection)?
            .into_iter()
            .map(mapper::to_document)
            .collect::<Result<Vec<_>>>()?;

        debug!(collection = %self.collection, count = documents.len(), "weaviate full-text search");
        Ok(documents)
    }
}
