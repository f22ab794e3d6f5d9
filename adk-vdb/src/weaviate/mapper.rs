//! Mapping GraphQL `Get` rows back into documents.

use serde_json::{Map, Value};

use crate::document::{Document, MetadataValue, SearchResult};
use crate::error::{Result, VdbError};
use crate::weaviate::TEXT_KEY;
use crate::weaviate::client::BACKEND;

const ADDITIONAL_KEY: &str = "_additional";

fn malformed(message: impl Into<String>) -> VdbError {
    VdbError::MalformedResponse { backend: BACKEND.to_string(), message: message.into() }
}

/// Take the rows for `class` out of a GraphQL `data` payload.
pub(crate) fn rows(data: Value, class: &str) -> Result<Vec<Map<String, Value>>> {
    let rows = match data {
        Value::Object(mut data) => data
            .remove("Get")
            .and_then(|mut get| get.get_mut(class).map(Value::take))
            .ok_or_else(|| malformed(format!("response has no Get.{class} section")))?,
        _ => return Err(malformed("response has no data section")),
    };

    match rows {
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::Object(row) => Ok(row),
                other => Err(malformed(format!("row is not an object: {other}"))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(malformed(format!("Get.{class} is not a list: {other}"))),
    }
}

/// Split a row into its text and the remaining properties.
pub(crate) fn to_document(mut row: Map<String, Value>) -> Result<Document> {
    let content = match row.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        Some(other) => return Err(malformed(format!("text field is not a string: {other}"))),
        None => return Err(malformed("row has no text field")),
    };
    let metadata =
        row.into_iter().map(|(k, v)| (k, MetadataValue::from_json(v))).collect();
    Ok(Document { content, metadata })
}

/// Map a vector-search row, reading the score from `_additional.distance`.
///
/// The `_additional` object is consumed; it does not reach the metadata.
pub(crate) fn to_search_result(mut row: Map<String, Value>) -> Result<SearchResult> {
    let additional = row.remove(ADDITIONAL_KEY).ok_or_else(|| malformed("row has no _additional"))?;
    let score = additional
        .get("distance")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("row has no _additional.distance"))? as f32;
    Ok(SearchResult { document: to_document(row)?, score })
}
