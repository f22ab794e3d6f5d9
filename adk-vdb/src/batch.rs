//! Batched ingestion shared by all backends.
//!
//! [`BatchWriter`] splits entries into size-bounded batches, hands each batch
//! to a backend's [`BatchSink`], resubmits items the backend rejected (and
//! whole batches that timed out) up to the configured retry bound, and adapts
//! the batch size to the observed per-object latency.
//!
//! Batches are submitted one at a time, so at most one write request is in
//! flight per upsert. A batch that still fails after the retry bound aborts
//! the upsert with [`VdbError::BatchWriteError`]; earlier batches stay written.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::document::{Document, normalize_metadata};
use crate::error::{Result, VdbError};
use crate::identity::assign_id;

/// Wall-clock time a dynamically sized batch should take to write.
pub const DEFAULT_TARGET_BATCH_LATENCY: Duration = Duration::from_secs(10);

/// Base delay between attempts; multiplied by the attempt number.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// A document ready to be written: identity assigned, metadata normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// Storage identity.
    pub id: Uuid,
    /// Text stored under the reserved text field.
    pub text: String,
    /// Embedding, if the caller supplied one.
    pub vector: Option<Vec<f32>>,
    /// Normalized metadata, excluding the text.
    pub properties: Map<String, Value>,
}

impl StoredEntry {
    /// Prepare `document` for writing, assigning its identity.
    pub fn from_document(document: &Document, vector: Option<&[f32]>) -> Self {
        Self {
            id: assign_id(document),
            text: document.content.clone(),
            vector: vector.map(<[f32]>::to_vec),
            properties: normalize_metadata(&document.metadata),
        }
    }

    /// Prepare a whole upsert, pairing documents with vectors by position.
    pub fn prepare(documents: &[Document], vectors: Option<&[Vec<f32>]>) -> Vec<Self> {
        documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                Self::from_document(doc, vectors.and_then(|v| v.get(i)).map(Vec::as_slice))
            })
            .collect()
    }
}

/// Result of writing one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The backend accepted the item.
    Written,
    /// The backend rejected the item with this message.
    Failed(String),
}

/// The backend half of a batch write.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Write one batch and report an outcome per entry, in the same order.
    ///
    /// Return [`VdbError::Timeout`] when the request timed out; the writer
    /// retries those. Any other error aborts the upsert.
    async fn write_batch(&self, entries: &[&StoredEntry]) -> Result<Vec<ItemOutcome>>;
}

/// Batching and retry policy for one adapter instance.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    /// Upper bound on entries per batch.
    pub batch_size: usize,
    /// Extra attempts after the first.
    pub max_retries: u32,
    /// Adapt the batch size to observed latency.
    pub dynamic: bool,
    /// Latency a dynamically sized batch aims for.
    pub target_latency: Duration,
    /// Base delay between attempts.
    pub retry_backoff: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from_config(&VectorStoreConfig::default())
    }
}

impl BatchPolicy {
    /// Policy described by an adapter configuration.
    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            dynamic: config.dynamic_batching,
            target_latency: DEFAULT_TARGET_BATCH_LATENCY,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Set the delay between attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Compute the next batch size from the last batch's latency.
///
/// The result aims for `target` per batch, at most doubles per step, and is
/// clamped to `[1, max]`.
pub fn next_batch_size(
    current: usize,
    max: usize,
    written: usize,
    elapsed: Duration,
    target: Duration,
) -> usize {
    let max = max.max(1);
    if written == 0 {
        return current.clamp(1, max);
    }
    let per_object = elapsed.as_secs_f64() / written as f64;
    if per_object <= f64::EPSILON {
        return current.saturating_mul(2).clamp(1, max);
    }
    let recommended = (target.as_secs_f64() / per_object).floor() as usize;
    recommended.min(current.saturating_mul(2)).clamp(1, max)
}

/// Writes entries through a [`BatchSink`] according to a [`BatchPolicy`].
pub struct BatchWriter<'a, S: BatchSink + ?Sized> {
    sink: &'a S,
    policy: BatchPolicy,
}

impl<'a, S: BatchSink + ?Sized> BatchWriter<'a, S> {
    /// Create a writer over `sink`.
    pub fn new(sink: &'a S, policy: BatchPolicy) -> Self {
        Self { sink, policy }
    }

    /// Write all entries and return their ids in input order.
    ///
    /// # Errors
    ///
    /// Returns [`VdbError::BatchWriteError`] for the first batch that still
    /// fails after the retry bound, or the sink's error if it is not retryable.
    pub async fn write(&self, entries: &[StoredEntry]) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        let mut size = self.policy.batch_size;
        let mut offset = 0;
        let mut batch = 0;

        while offset < entries.len() {
            let end = (offset + size).min(entries.len());
            let slice = &entries[offset..end];
            let started = Instant::now();
            self.write_one(batch, slice).await?;
            let elapsed = started.elapsed();

            debug!(
                backend = self.sink.backend(),
                batch,
                count = slice.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "wrote batch"
            );

            if self.policy.dynamic {
                size = next_batch_size(
                    size,
                    self.policy.batch_size,
                    slice.len(),
                    elapsed,
                    self.policy.target_latency,
                );
            }
            offset = end;
            batch += 1;
        }

        Ok(ids)
    }

    async fn write_one(&self, batch: usize, entries: &[StoredEntry]) -> Result<()> {
        let backend = self.sink.backend();
        let mut pending: Vec<&StoredEntry> = entries.iter().collect();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let result = self.sink.write_batch(&pending).await;
            let last_failure = match result {
                Ok(outcomes) => {
                    if outcomes.len() != pending.len() {
                        return Err(VdbError::MalformedResponse {
                            backend: backend.to_string(),
                            message: format!(
                                "batch {batch}: {} outcomes for {} objects",
                                outcomes.len(),
                                pending.len()
                            ),
                        });
                    }
                    let mut failed = Vec::new();
                    let mut message = String::new();
                    for (entry, outcome) in pending.iter().zip(outcomes) {
                        if let ItemOutcome::Failed(reason) = outcome {
                            failed.push(*entry);
                            message = format!("object {}: {reason}", entry.id);
                        }
                    }
                    if failed.is_empty() {
                        return Ok(());
                    }
                    pending = failed;
                    message
                }
                Err(e @ VdbError::Timeout { .. }) => e.to_string(),
                Err(e) => return Err(e),
            };

            if attempts > self.policy.max_retries {
                error!(
                    backend,
                    batch,
                    attempts,
                    failed = pending.len(),
                    error = %last_failure,
                    "batch write failed"
                );
                return Err(VdbError::BatchWriteError {
                    backend: backend.to_string(),
                    batch,
                    attempts,
                    message: last_failure,
                });
            }

            warn!(
                backend,
                batch,
                attempt = attempts,
                pending = pending.len(),
                error = %last_failure,
                "retrying batch write"
            );
            if !self.policy.retry_backoff.is_zero() {
                tokio::time::sleep(self.policy.retry_backoff * attempts).await;
            }
        }
    }
}
