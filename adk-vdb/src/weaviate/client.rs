//! Thin client over the Weaviate REST and GraphQL endpoints the adapter uses.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::error::{Result, VdbError};

pub(crate) const BACKEND: &str = "weaviate";

/// One object in a `POST /v1/batch/objects` request.
#[derive(Debug, Serialize)]
pub(crate) struct BatchObject<'a> {
    pub class: &'a str,
    pub id: String,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<&'a [f32]>,
}

#[derive(Serialize)]
struct BatchObjectsRequest<'a> {
    objects: Vec<BatchObject<'a>>,
}

/// Per-object result of a batch write.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchObjectResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<ObjectResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectResult {
    #[serde(default)]
    pub errors: Option<ErrorList>,
}

/// Weaviate's `{"error": [{"message": ...}]}` shape.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorList {
    #[serde(default)]
    pub error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub message: String,
}

impl ErrorList {
    pub(crate) fn joined(&self) -> Option<String> {
        if self.error.is_empty() {
            return None;
        }
        Some(self.error.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; "))
    }
}

#[derive(Deserialize)]
struct BatchDeleteResponse {
    #[serde(default)]
    results: Option<BatchDeleteResults>,
}

#[derive(Deserialize)]
struct BatchDeleteResults {
    #[serde(default)]
    failed: u64,
    #[serde(default)]
    matches: u64,
}

/// A Weaviate connection shared by every operation of one adapter.
///
/// Wraps a single `reqwest::Client` built with the configured connect and
/// read timeouts; it is safe to use from concurrent operations.
#[derive(Debug, Clone)]
pub(crate) struct WeaviateClient {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl WeaviateClient {
    /// Build the client. Performs no network I/O.
    pub(crate) fn new(config: &VectorStoreConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(VdbError::ConfigError("weaviate endpoint is required".to_string()));
        }
        let mut base = Url::parse(endpoint).map_err(|e| {
            VdbError::ConfigError(format!("weaviate endpoint '{endpoint}' is invalid: {e}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| VdbError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base, api_key: config.api_key.clone().filter(|k| !k.is_empty()) })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| VdbError::ConfigError(format!("invalid weaviate path '{path}': {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorize(request).send().await.map_err(transport_error)
    }

    /// `GET /v1/.well-known/ready`.
    pub(crate) async fn ready(&self) -> Result<()> {
        let response = self.send(self.http.get(self.url("v1/.well-known/ready")?)).await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(VdbError::ConnectionError {
            backend: BACKEND.to_string(),
            message: format!("weaviate is not ready: {}", response.status()),
        })
    }

    /// Whether a class with this exact name exists.
    pub(crate) async fn class_exists(&self, class: &str) -> Result<bool> {
        let response = self.send(self.http.get(self.url(&format!("v1/schema/{class}"))?)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(status_error(response).await),
        }
    }

    /// Create a class. A class created concurrently by someone else counts as success.
    pub(crate) async fn create_class(&self, schema: &Value) -> Result<()> {
        let response = self.send(self.http.post(self.url("v1/schema")?).json(schema)).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let err = status_error(response).await;
        if status == StatusCode::UNPROCESSABLE_ENTITY
            && err.to_string().to_ascii_lowercase().contains("already exists")
        {
            debug!(error = %err, "weaviate class created concurrently");
            return Ok(());
        }
        Err(err)
    }

    /// Delete a class and all of its objects. Missing classes are not an error.
    pub(crate) async fn delete_class(&self, class: &str) -> Result<()> {
        let response =
            self.send(self.http.delete(self.url(&format!("v1/schema/{class}"))?)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(status_error(response).await),
        }
    }

    /// `POST /v1/batch/objects`, returning one result per submitted object.
    pub(crate) async fn batch_objects(
        &self,
        objects: Vec<BatchObject<'_>>,
    ) -> Result<Vec<BatchObjectResult>> {
        let body = BatchObjectsRequest { objects };
        let response =
            self.send(self.http.post(self.url("v1/batch/objects")?).json(&body)).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        response.json().await.map_err(decode_error)
    }

    /// `DELETE /v1/batch/objects` for every object in `class` matching `where_filter`.
    pub(crate) async fn batch_delete(&self, class: &str, where_filter: Value) -> Result<u64> {
        let body = serde_json::json!({
            "match": { "class": class, "where": where_filter },
            "output": "minimal",
        });
        let response =
            self.send(self.http.delete(self.url("v1/batch/objects")?).json(&body)).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let parsed: BatchDeleteResponse = response.json().await.map_err(decode_error)?;
        let results = parsed.results.unwrap_or(BatchDeleteResults { failed: 0, matches: 0 });
        if results.failed > 0 {
            return Err(VdbError::QueryError {
                backend: BACKEND.to_string(),
                message: format!(
                    "{} of {} matching objects could not be deleted",
                    results.failed, results.matches
                ),
            });
        }
        Ok(results.matches)
    }

    /// `DELETE /v1/objects/{class}/{id}`. Returns `false` if the object did not exist.
    pub(crate) async fn delete_object(&self, class: &str, id: &Uuid) -> Result<bool> {
        let response =
            self.send(self.http.delete(self.url(&format!("v1/objects/{class}/{id}"))?)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(status_error(response).await),
        }
    }

    /// `POST /v1/graphql`. A non-empty `errors` list is a [`VdbError::QueryError`].
    pub(crate) async fn graphql(&self, query: &str) -> Result<Value> {
        let body = serde_json::json!({ "query": query });
        let response = self.send(self.http.post(self.url("v1/graphql")?).json(&body)).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let mut payload: Value = response.json().await.map_err(decode_error)?;

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(backend = BACKEND, error = %message, "graphql query failed");
                return Err(VdbError::QueryError {
                    backend: BACKEND.to_string(),
                    message: format!("Error during query: {message}"),
                });
            }
        }
        Ok(payload.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

fn transport_error(e: reqwest::Error) -> VdbError {
    error!(backend = BACKEND, error = %e, "request failed");
    classify_transport(e.is_connect(), e.is_timeout(), e.to_string())
}

/// A connect failure is a [`VdbError::ConnectionError`] even when it was a
/// connect timeout. Only timeouts on an established connection are
/// [`VdbError::Timeout`], which batch writes retry.
fn classify_transport(connect: bool, timeout: bool, message: String) -> VdbError {
    if timeout && !connect {
        VdbError::Timeout { backend: BACKEND.to_string(), message }
    } else {
        VdbError::ConnectionError {
            backend: BACKEND.to_string(),
            message: format!("Vector database connection error: {message}"),
        }
    }
}

fn decode_error(e: reqwest::Error) -> VdbError {
    error!(backend = BACKEND, error = %e, "failed to parse response");
    VdbError::MalformedResponse {
        backend: BACKEND.to_string(),
        message: format!("failed to parse response: {e}"),
    }
}

/// Turn a non-success response into a [`VdbError::QueryError`] carrying
/// Weaviate's own message when it sent one.
async fn status_error(response: Response) -> VdbError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorList>(&body)
        .ok()
        .and_then(|e| e.joined())
        .unwrap_or(body);

    error!(backend = BACKEND, %status, "API error");
    VdbError::QueryError {
        backend: BACKEND.to_string(),
        message: format!("API returned {status}: {detail}"),
    }
}
