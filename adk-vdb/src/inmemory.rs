//! In-memory vector store using cosine distance and BM25.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency backend
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It follows the
//! same identity, batching and threshold rules as the remote
//! backends and is meant for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::batch::{BatchPolicy, BatchSink, BatchWriter, ItemOutcome, StoredEntry};
use crate::config::VectorStoreConfig;
use crate::document::{DOC_ID_KEY, Document, MetadataValue, SearchResult};
use crate::error::{Result, VdbError};
use crate::factory::VectorType;
use crate::filter::MetadataFilter;
use crate::query::{FullTextQuery, VectorQuery};
use crate::vectorstore::{VectorStore, check_vectors, retain_within_threshold};

const BACKEND: &str = "in_memory";

/// BM25 term-frequency saturation.
const BM25_K1: f32 = 1.2;

/// BM25 length normalization.
const BM25_B: f32 = 0.75;

/// An in-memory vector store bound to one collection.
///
/// Collections are stored as nested `HashMap`s: collection name → entry id → entry.
/// Reads and writes go through a `tokio::sync::RwLock` that is never held
/// across an await on anything but the lock itself.
///
/// # Example
///
/// ```rust,ignore
/// use adk_vdb::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new("Docs_Node");
/// let ids = store.create_collection(&documents, Some(&vectors)).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    collection: String,
    policy: BatchPolicy,
    collections: RwLock<HashMap<String, HashMap<Uuid, StoredEntry>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store bound to `collection` with the default policy.
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_config(collection, VectorStoreConfig::default())
    }

    /// Create an empty store using the batch policy from `config`.
    pub fn with_config(collection: impl Into<String>, config: VectorStoreConfig) -> Self {
        Self {
            collection: collection.into(),
            policy: BatchPolicy::from_config(&config),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries in the collection, or `None` if it does not exist.
    pub async fn entry_count(&self) -> Option<usize> {
        self.collections.read().await.get(&self.collection).map(HashMap::len)
    }

    fn missing(&self) -> VdbError {
        VdbError::QueryError {
            backend: BACKEND.to_string(),
            message: format!("collection '{}' does not exist", self.collection),
        }
    }
}

/// Compute cosine distance (`1 - cosine similarity`) between two vectors.
///
/// Returns 1.0 if either vector has zero magnitude or the lengths differ.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn to_document(entry: &StoredEntry) -> Document {
    let metadata = entry
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), MetadataValue::from_json(v.clone())))
        .collect();
    Document { content: entry.text.clone(), metadata }
}

fn entry_matches(entry: &StoredEntry, filter: Option<&MetadataFilter>) -> bool {
    match filter {
        None => true,
        Some(filter) => filter.matches(&to_document(entry)),
    }
}

/// Score every candidate with BM25 over the text field. Candidates that share
/// no term with the query are dropped.
fn bm25_scores<'a>(query: &str, candidates: &[&'a StoredEntry]) -> Vec<(&'a StoredEntry, f32)> {
    let terms = tokenize(query);
    if terms.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = candidates.iter().map(|e| tokenize(&e.text)).collect();
    let n = docs.len() as f32;
    let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f32 / n;

    let mut scored = Vec::new();
    for (entry, tokens) in candidates.iter().zip(&docs) {
        let len = tokens.len() as f32;
        let mut score = 0.0;
        for term in &terms {
            let tf = tokens.iter().filter(|t| *t == term).count() as f32;
            if tf == 0.0 {
                continue;
            }
            let df = docs.iter().filter(|d| d.contains(term)).count() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let norm = if avg_len > 0.0 { len / avg_len } else { 1.0 };
            score += idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm));
        }
        if score > 0.0 {
            scored.push((*entry, score));
        }
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

#[async_trait]
impl BatchSink for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn write_batch(&self, entries: &[&StoredEntry]) -> Result<Vec<ItemOutcome>> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(&self.collection).ok_or_else(|| self.missing())?;
        for entry in entries {
            store.insert(entry.id, (*entry).clone());
        }
        Ok(vec![ItemOutcome::Written; entries.len()])
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn store_type(&self) -> VectorType {
        VectorType::InMemory
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(self.collection.clone()).or_default();
        Ok(())
    }

    async fn upsert(
        &self,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<Vec<String>> {
        check_vectors(documents, vectors)?;
        let entries = StoredEntry::prepare(documents, vectors);
        let ids = BatchWriter::new(self, self.policy.clone()).write(&entries).await?;
        debug!(collection = %self.collection, count = ids.len(), "upserted documents in memory");
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(&self.collection).ok_or_else(|| self.missing())?;
        for id in ids.iter().filter_map(|id| Uuid::parse_str(id).ok()) {
            store.remove(&id);
        }
        Ok(())
    }

    async fn delete_by_metadata_field(&self, field: &str, value: &str) -> Result<()> {
        let filter = MetadataFilter::equal(field, value);
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(&self.collection).ok_or_else(|| self.missing())?;
        store.retain(|_, entry| !entry_matches(entry, Some(&filter)));
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(&self.collection);
        Ok(())
    }

    async fn exists(&self, doc_id: &str) -> Result<bool> {
        let filter = MetadataFilter::equal(DOC_ID_KEY, doc_id);
        let collections = self.collections.read().await;
        let store = collections.get(&self.collection).ok_or_else(|| self.missing())?;
        Ok(store.values().any(|entry| entry_matches(entry, Some(&filter))))
    }

    async fn search_by_vector(
        &self,
        vector: &[f32],
        query: &VectorQuery,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(&self.collection).ok_or_else(|| self.missing())?;

        let mut scored: Vec<SearchResult> = store
            .values()
            .filter(|entry| entry_matches(entry, query.filter.as_ref()))
            .filter_map(|entry| {
                let stored = entry.vector.as_deref()?;
                Some(SearchResult {
                    document: to_document(entry),
                    score: cosine_distance(stored, vector),
                })
            })
            .collect();

        scored.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit);
        Ok(retain_within_threshold(scored, query.score_threshold))
    }

    async fn search_by_full_text(
        &self,
        text: &str,
        query: &FullTextQuery,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let store = collections.get(&self.collection).ok_or_else(|| self.missing())?;

        let candidates: Vec<&StoredEntry> =
            store.values().filter(|entry| entry_matches(entry, query.filter.as_ref())).collect();

        let documents = bm25_scores(text, &candidates)
            .into_iter()
            .take(query.limit)
            .map(|(entry, score)| {
                let mut document = to_document(entry);
                if !query.additional.is_empty() {
                    let additional: Map<String, Value> = query
                        .additional
                        .iter()
                        .map(|field| {
                            let value = match field.as_str() {
                                "id" => Value::String(entry.id.to_string()),
                                "score" => Value::String(score.to_string()),
                                _ => Value::Null,
                            };
                            (field.clone(), value)
                        })
                        .collect();
                    document
                        .metadata
                        .insert("_additional".to_string(), MetadataValue::Json(additional.into()));
                }
                document
            })
            .collect();

        Ok(documents)
    }
}
