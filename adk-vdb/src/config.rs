//! Configuration for vector store adapters.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VdbError};
use crate::factory::VectorType;

/// Default number of objects per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of extra attempts for a failed batch item or a timed-out batch.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Configuration for a single adapter instance.
///
/// Batch and retry policy are per instance, so several adapters with
/// different policies can coexist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Which backend to construct.
    pub vector_type: VectorType,
    /// Backend endpoint URL. Required for remote backends.
    pub endpoint: String,
    /// Optional API key sent as a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upper bound on objects per batch.
    pub batch_size: usize,
    /// Extra attempts for failed batch items and timed-out batches.
    pub max_retries: u32,
    /// Shrink and regrow batches based on observed write latency.
    pub dynamic_batching: bool,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-request read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            vector_type: VectorType::default(),
            endpoint: String::new(),
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            dynamic_batching: true,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl VectorStoreConfig {
    /// Create a new builder for constructing a [`VectorStoreConfig`].
    pub fn builder() -> VectorStoreConfigBuilder {
        VectorStoreConfigBuilder::default()
    }

    /// Load configuration from the environment.
    ///
    /// Reads `VECTOR_STORE` (defaults to `weaviate`), `WEAVIATE_ENDPOINT`,
    /// `WEAVIATE_API_KEY` and `WEAVIATE_BATCH_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns [`VdbError::ConfigError`] if a variable cannot be parsed or the
    /// resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(kind) = std::env::var("VECTOR_STORE") {
            builder = builder.vector_type(kind.parse()?);
        }
        if let Ok(endpoint) = std::env::var("WEAVIATE_ENDPOINT") {
            builder = builder.endpoint(endpoint);
        }
        if let Ok(api_key) = std::env::var("WEAVIATE_API_KEY") {
            if !api_key.is_empty() {
                builder = builder.api_key(api_key);
            }
        }
        if let Ok(batch_size) = std::env::var("WEAVIATE_BATCH_SIZE") {
            let batch_size = batch_size.parse::<usize>().map_err(|e| {
                VdbError::ConfigError(format!("WEAVIATE_BATCH_SIZE '{batch_size}' is invalid: {e}"))
            })?;
            builder = builder.batch_size(batch_size);
        }
        builder.build()
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`VdbError::ConfigError`] if:
    /// - the backend is remote and `endpoint` is empty
    /// - `batch_size == 0`
    pub fn validate(&self) -> Result<()> {
        if self.vector_type.is_remote() && self.endpoint.trim().is_empty() {
            return Err(VdbError::ConfigError(format!(
                "endpoint is required for the {} vector store",
                self.vector_type
            )));
        }
        if self.batch_size == 0 {
            return Err(VdbError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`VectorStoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct VectorStoreConfigBuilder {
    config: VectorStoreConfig,
}

impl VectorStoreConfigBuilder {
    /// Set the backend kind.
    pub fn vector_type(mut self, vector_type: VectorType) -> Self {
        self.config.vector_type = vector_type;
        self
    }

    /// Set the backend endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Set the upper bound on objects per batch.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the retry bound for batch writes.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Enable or disable latency-driven batch sizing.
    pub fn dynamic_batching(mut self, enabled: bool) -> Self {
        self.config.dynamic_batching = enabled;
        self
    }

    /// Set the connect and read timeouts in seconds.
    pub fn timeouts(mut self, connect_secs: u64, read_secs: u64) -> Self {
        self.config.connect_timeout_secs = connect_secs;
        self.config.read_timeout_secs = read_secs;
        self
    }

    /// Build the [`VectorStoreConfig`], validating it.
    ///
    /// # Errors
    ///
    /// See [`VectorStoreConfig::validate`].
    pub fn build(self) -> Result<VectorStoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_is_rejected_for_weaviate() {
        let err = VectorStoreConfig::builder().endpoint("  ").build().unwrap_err();
        assert!(matches!(err, VdbError::ConfigError(_)));
    }

    #[test]
    fn in_memory_needs_no_endpoint() {
        let config =
            VectorStoreConfig::builder().vector_type(VectorType::InMemory).build().unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = VectorStoreConfig::builder()
            .endpoint("http://localhost:8080")
            .batch_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, VdbError::ConfigError(_)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"endpoint": "http://weaviate:8080", "api_key": "k"}"#;
        let config: VectorStoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vector_type, VectorType::Weaviate);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(config.validate().is_ok());
    }
}
