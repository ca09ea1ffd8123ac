use crate::error::DocweaveError;
use serde_json::{Map, Value};
use std::path::Path;

pub const APIS_KEY: &str = "apis";
pub const API_HEADERS_KEY: &str = "api_headers";

/// Name → value bindings for one render session.
///
/// Values are scalars, ordered sequences or key → value mappings. Two keys are
/// reserved for the `dataframe` API path: `apis` (url → `{params: {...}}`)
/// and `api_headers` (header name → value).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn from_value(value: Value) -> Result<Self, DocweaveError> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(DocweaveError::InvalidContext(format!(
                "context root must be a mapping, got {}",
                value_kind(&other)
            ))),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DocweaveError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| DocweaveError::InvalidContext(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DocweaveError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DocweaveError::InvalidContext(format!("{}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON body posted to `url`: `apis[url].params`, or an empty mapping.
    pub fn api_params(&self, url: &str) -> Value {
        self.values
            .get(APIS_KEY)
            .and_then(|apis| apis.get(url))
            .and_then(|api| api.get("params"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    pub fn api_headers(&self) -> Vec<(String, String)> {
        let Some(Value::Object(headers)) = self.values.get(API_HEADERS_KEY) else {
            return Vec::new();
        };
        headers
            .iter()
            .map(|(name, value)| (name.clone(), scalar_text(value)))
            .collect()
    }
}

/// String form substituted for a placeholder.
///
/// Sequences join with `", "`, mappings render one `key: value` line per entry.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, value)| format!("{key}: {}", scalar_text(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar_text(other),
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequences_and_mappings_render_as_text() {
        assert_eq!(render_value(&json!(["a", 1, true])), "a, 1, true");
        assert_eq!(
            render_value(&json!({"name": "Ada", "year": 1843})),
            "name: Ada\nyear: 1843"
        );
        assert_eq!(render_value(&json!(3.5)), "3.5");
        assert_eq!(render_value(&json!(null)), "");
    }

    #[test]
    fn non_mapping_root_is_invalid_context() {
        let err = Context::from_json_str("[1, 2]").expect_err("sequence root");
        assert!(matches!(err, DocweaveError::InvalidContext(_)));
        assert!(Context::from_json_str("{\"a\": 1}").is_ok());
    }

    #[test]
    fn api_lookups_fall_back_to_empty() {
        let ctx = Context::from_value(json!({
            "apis": {"https://api.test/report": {"params": {"year": 2024}}},
            "api_headers": {"Authorization": "Bearer t", "X-Retry": 0}
        }))
        .expect("context");
        assert_eq!(ctx.api_params("https://api.test/report"), json!({"year": 2024}));
        assert_eq!(ctx.api_params("https://api.test/other"), json!({}));
        let headers = ctx.api_headers();
        assert!(headers.contains(&("X-Retry".to_string(), "0".to_string())));
        assert_eq!(Context::new().api_headers(), Vec::new());
    }
}
