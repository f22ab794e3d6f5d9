//! Error types for the `adk-vdb` crate.

use thiserror::Error;

/// Errors that can occur in vector store operations.
#[derive(Debug, Error)]
pub enum VdbError {
    /// A configuration validation error. Raised before any network call.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The backend could not be reached or the transport failed.
    #[error("Connection error ({backend}): {message}")]
    ConnectionError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A request to the backend exceeded the configured connect or read timeout.
    ///
    /// Batch writes retry these up to the configured bound; every other
    /// operation surfaces them to the caller.
    #[error("Timeout ({backend}): {message}")]
    Timeout {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend reported errors for a query or management request.
    #[error("Query error ({backend}): {message}")]
    QueryError {
        /// The vector store backend that produced the error.
        backend: String,
        /// The message reported by the backend.
        message: String,
    },

    /// A batch could not be written after exhausting the retry bound.
    ///
    /// Batches written before this one are not rolled back.
    #[error(
        "Batch write error ({backend}): batch {batch} failed after {attempts} attempts: {message}"
    )]
    BatchWriteError {
        /// The vector store backend that produced the error.
        backend: String,
        /// Zero-based index of the failed batch.
        batch: usize,
        /// How many times the batch was submitted.
        attempts: u32,
        /// The last failure reported for the batch.
        message: String,
    },

    /// The backend answered, but a required part of the response was missing
    /// or could not be decoded.
    #[error("Malformed response ({backend}): {message}")]
    MalformedResponse {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of what was wrong.
        message: String,
    },

    /// The caller passed arguments that violate an operation's preconditions.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A convenience result type for vector store operations.
pub type Result<T> = std::result::Result<T, VdbError>;
