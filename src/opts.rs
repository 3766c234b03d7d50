//! Resolution options carried by references.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for resolving one source.
///
/// Two requests for the same URI with different options are distinct
/// references, so the canonical JSON form takes part in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,

    /// Overrides the content type reported by the reader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Reader and parser specific settings (`prefix`, `watchInterval`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResolveOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = Some(watch);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Build options from a JSON object; non-objects yield defaults.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }

    pub fn is_watching(&self) -> bool {
        self.watch.unwrap_or(false)
    }

    /// Canonical string form used in the reference cache key.
    pub fn cache_key(&self) -> String {
        // Map is ordered, so equal options always serialize identically.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_round_trip() {
        let opts: ResolveOpts =
            serde_json::from_value(json!({"watch": true, "contentType": "text/plain", "prefix": "APP"}))
                .unwrap();
        assert_eq!(opts.watch, Some(true));
        assert_eq!(opts.content_type.as_deref(), Some("text/plain"));
        assert_eq!(opts.get_str("prefix"), Some("APP"));
    }

    #[test]
    fn test_cache_key_is_structural() {
        let a = ResolveOpts::new().with("b", json!(1)).with("a", json!(2));
        let b = ResolveOpts::new().with("a", json!(2)).with("b", json!(1));
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), a.clone().with_watch(true).cache_key());
    }
}
