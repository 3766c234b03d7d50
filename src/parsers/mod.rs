//! Content parsers.
//!
//! A [`Parser`] turns raw [`Content`] of one content type into a [`Node`],
//! recognising the token encodings of its format. The registry picks the first
//! parser whose [`Parser::can_parse`] matches.

pub mod argv;
pub mod env;
pub mod ini;
pub mod json;
pub mod toml;
pub mod yaml;

pub use self::argv::ArgvParser;
pub use self::env::EnvParser;
pub use self::ini::IniParser;
pub use self::json::JsonParser;
pub use self::toml::TomlParser;
pub use self::yaml::YamlParser;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::{Content, essence};
use std::sync::Arc;

pub trait Parser: Send + Sync {
    /// Short name used in traces.
    fn name(&self) -> &'static str;

    fn can_parse(&self, content_type: &str) -> bool;

    fn parse(&self, content: Content, opts: &ResolveOpts, content_type: &str) -> Result<Node>;
}

/// Ordered list of parsers; first match wins.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.push(JsonParser);
        registry.push(YamlParser);
        registry.push(TomlParser);
        registry.push(EnvParser);
        registry.push(IniParser);
        registry.push(ArgvParser);
        registry
    }

    pub fn push(&mut self, parser: impl Parser + 'static) {
        self.parsers.push(Arc::new(parser));
    }

    pub fn push_arc(&mut self, parser: Arc<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// Put `parser` ahead of the existing ones.
    pub fn prepend(&mut self, parser: Arc<dyn Parser>) {
        self.parsers.insert(0, parser);
    }

    pub fn find(&self, content_type: &str) -> Option<Arc<dyn Parser>> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(content_type))
            .cloned()
    }
}

/// True when `content_type` names `expected`, ignoring parameters and case.
pub(crate) fn media_type_is(content_type: &str, expected: &[&str]) -> bool {
    let essence = essence(content_type);
    expected.iter().any(|e| essence == *e)
}

/// Text view of raw content.
pub(crate) fn content_text(content: Content, content_type: &str) -> Result<String> {
    match content {
        Content::Text(text) => Ok(text),
        Content::Bytes(bytes) => String::from_utf8(bytes).map_err(|e| Error::parse(content_type, e)),
        Content::Structured(_) => Err(Error::parse(
            content_type,
            "expected text content, got structured data",
        )),
    }
}

/// Convert a finite float to a JSON number, integral values as integers.
pub(crate) fn float_number(f: f64) -> Option<serde_json::Number> {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some((f as i64).into())
    } else {
        serde_json::Number::from_f64(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_media_types() {
        let registry = ParserRegistry::with_defaults();
        let name = |ct: &str| registry.find(ct).map(|p| p.name());
        assert_eq!(name("application/json; charset=utf-8"), Some("json"));
        assert_eq!(name("application/yaml"), Some("yaml"));
        assert_eq!(name("text/yaml"), Some("yaml"));
        assert_eq!(name("application/toml"), Some("toml"));
        assert_eq!(name("application/x.env"), Some("env"));
        assert_eq!(name("application/x.ini"), Some("ini"));
        assert_eq!(name("application/x.argv"), Some("argv"));
        assert_eq!(name("application/xml"), None);
    }
}
