//! The vector store adapter contract.

use async_trait::async_trait;

use crate::document::{Document, SCORE_KEY, SearchResult};
use crate::error::{Result, VdbError};
use crate::factory::VectorType;
use crate::naming::IndexStruct;
use crate::query::{FullTextQuery, VectorQuery};

/// A vector database backend bound to one collection.
///
/// Every backend assigns identities the same way (see [`crate::identity`]),
/// so a dataset can be re-indexed into a different backend and keep its ids.
///
/// # Example
///
/// ```rust,ignore
/// use adk_vdb::{Dataset, VectorQuery, VectorStoreConfig, create_vector_store};
///
/// let config = VectorStoreConfig::from_env()?;
/// let store = create_vector_store(&config, &Dataset::new(dataset_id), default_attributes())?;
/// let ids = store.create_collection(&documents, Some(&embeddings)).await?;
/// let hits = store.search_by_vector(&query_embedding, &VectorQuery::new().limit(5)).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend kind, used in the persisted storage descriptor.
    fn store_type(&self) -> VectorType;

    /// The collection this store reads and writes.
    fn collection(&self) -> &str;

    /// Descriptor to persist alongside the dataset.
    fn describe_storage(&self) -> IndexStruct {
        IndexStruct::new(self.store_type().as_str(), self.collection())
    }

    /// Create the collection schema if it does not exist. Idempotent.
    async fn ensure_collection(&self) -> Result<()>;

    /// Ensure the collection exists, then upsert `documents`.
    async fn create_collection(
        &self,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>> {
        self.ensure_collection().await?;
        self.upsert(documents, vectors).await
    }

    /// Write documents in batches and return their ids in input order.
    ///
    /// `vectors`, when given, must have one entry per document.
    async fn upsert(
        &self,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>>;

    /// Remove entries by id. Ids that do not exist are ignored.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<()>;

    /// Remove every entry whose metadata `field` equals `value`.
    async fn delete_by_metadata_field(&self, field: &str, value: &str) -> Result<()>;

    /// Drop the collection and all of its entries.
    async fn drop_collection(&self) -> Result<()>;

    /// Whether an entry with metadata `doc_id == doc_id` exists.
    async fn exists(&self, doc_id: &str) -> Result<bool>;

    /// Nearest-neighbour search, filtered by the query's distance threshold.
    async fn search_by_vector(
        &self,
        vector: &[f32],
        query: &VectorQuery,
    ) -> Result<Vec<SearchResult>>;

    /// BM25 search over the text field.
    async fn search_by_full_text(&self, text: &str, query: &FullTextQuery)
    -> Result<Vec<Document>>;
}

/// Whether a row with `score` survives `threshold`.
///
/// Scores are distances. A threshold of `0.0` or below disables filtering,
/// otherwise only rows strictly closer than the threshold pass.
pub fn passes_threshold(score: f32, threshold: f32) -> bool {
    threshold <= 0.0 || score < threshold
}

/// Drop rows that fail [`passes_threshold`] and record the score of the rest
/// under the `score` metadata key.
pub fn retain_within_threshold(rows: Vec<SearchResult>, threshold: f32) -> Vec<SearchResult> {
    rows.into_iter()
        .filter(|row| passes_threshold(row.score, threshold))
        .map(|mut row| {
            row.document.metadata.insert(SCORE_KEY.to_string(), f64::from(row.score).into());
            row
        })
        .collect()
}

/// Check that `vectors`, if given, pairs one-to-one with `documents`.
pub fn check_vectors(documents: &[Document], vectors: Option<&[Vec<f32>]>) -> Result<()> {
    match vectors {
        Some(vectors) if vectors.len() != documents.len() => Err(VdbError::InvalidInput(format!(
            "got {} vectors for {} documents",
            vectors.len(),
            documents.len()
        ))),
        _ => Ok(()),
    }
}
