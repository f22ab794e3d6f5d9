//! GraphQL `Get` query construction and `where` filters.

use serde_json::{Value, json};

use crate::error::{Result, VdbError};
use crate::filter::{FilterOperator, MetadataFilter};

/// Whether `name` is a valid GraphQL/Weaviate property name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` is a valid Weaviate class name.
pub(crate) fn is_valid_class(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase()) && is_valid_name(name)
}

fn operator_name(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::Equal => "Equal",
    }
}

/// A string literal. JSON string escaping is valid GraphQL string escaping.
fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// The filter as the JSON document used by the REST API.
pub(crate) fn where_json(filter: &MetadataFilter) -> Value {
    json!({
        "path": [filter.field],
        "operator": operator_name(filter.operator),
        "valueText": filter.value,
    })
}

/// The filter as a GraphQL input object.
fn where_graphql(filter: &MetadataFilter) -> String {
    format!(
        "{{path: [{}], operator: {}, valueText: {}}}",
        literal(&filter.field),
        operator_name(filter.operator),
        literal(&filter.value)
    )
}

/// Builder for `{ Get { Class(args) { fields _additional { ... } } } }`.
#[derive(Debug, Clone)]
pub(crate) struct GetQuery {
    class: String,
    arguments: Vec<String>,
    fields: Vec<String>,
    additional: Vec<String>,
}

impl GetQuery {
    pub(crate) fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            arguments: Vec::new(),
            fields: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Nearest-neighbour search against `vector`.
    pub(crate) fn near_vector(mut self, vector: &[f32]) -> Result<Self> {
        if vector.is_empty() {
            return Err(VdbError::InvalidInput("query vector is empty".to_string()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VdbError::InvalidInput("query vector contains NaN or infinity".to_string()));
        }
        let values = vector.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        self.arguments.push(format!("nearVector: {{vector: [{values}]}}"));
        Ok(self)
    }

    /// BM25 search for `query` over `properties`.
    pub(crate) fn bm25(mut self, query: &str, properties: &[&str]) -> Self {
        let properties = properties.iter().map(|p| literal(p)).collect::<Vec<_>>().join(", ");
        self.arguments
            .push(format!("bm25: {{query: {}, properties: [{properties}]}}", literal(query)));
        self
    }

    pub(crate) fn filter(mut self, filter: Option<&MetadataFilter>) -> Self {
        if let Some(filter) = filter {
            self.arguments.push(format!("where: {}", where_graphql(filter)));
        }
        self
    }

    pub(crate) fn limit(mut self, limit: usize) -> Self {
        self.arguments.push(format!("limit: {limit}"));
        self
    }

    pub(crate) fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub(crate) fn additional<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional.extend(fields.into_iter().map(Into::into));
        self
    }

    pub(crate) fn build(&self) -> String {
        let mut selection = self.fields.join(" ");
        if !self.additional.is_empty() {
            if !selection.is_empty() {
                selection.push(' ');
            }
            selection.push_str(&format!("_additional {{ {} }}", self.additional.join(" ")));
        }
        let arguments = if self.arguments.is_empty() {
            String::new()
        } else {
            format!("({})", self.arguments.join(", "))
        };
        format!("{{ Get {{ {}{arguments} {{ {selection} }} }} }}", self.class)
    }
}
