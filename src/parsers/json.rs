//! JSON parser. `{"$ref": uri, "$opts": {...}}` and `{"$query": expr}`
//! objects become tokens.

use super::{Parser, content_text, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Content;
use crate::token::{QueryToken, RefToken, Token};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(content_type, &["application/json", "text/json"])
            || content_type.split(';').next().is_some_and(|t| t.trim().ends_with("+json"))
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let value = match content {
            Content::Structured(node) => return Ok(node),
            other => {
                let text = content_text(other, content_type)?;
                serde_json::from_str::<Value>(&text).map_err(|e| Error::parse(content_type, e))?
            }
        };
        to_node(value)
    }
}

/// Convert JSON into a node, turning `$ref` / `$query` objects into tokens.
pub fn to_node(value: Value) -> Result<Node> {
    match value {
        Value::Object(map) => object_to_node(map),
        Value::Array(items) => Ok(Node::Array(
            items.into_iter().map(to_node).collect::<Result<_>>()?,
        )),
        scalar => Ok(Node::from(scalar)),
    }
}

fn object_to_node(mut map: Map<String, Value>) -> Result<Node> {
    if let Some(Value::String(query)) = map.get("$query") {
        return Ok(Token::Query(QueryToken::new(query.clone())).into());
    }
    if let Some(Value::String(uri)) = map.get("$ref") {
        let uri = uri.clone();
        let opts = match map.remove("$opts") {
            Some(raw) => ResolveOpts::from_value(raw)
                .map_err(|e| Error::InvalidToken(format!("invalid $opts for {}: {}", uri, e)))?,
            None => ResolveOpts::default(),
        };
        return Ok(Token::Ref(RefToken::with_opts(uri, opts)?).into());
    }
    Ok(Node::Object(
        map.into_iter()
            .map(|(k, v)| Ok((k, to_node(v)?)))
            .collect::<Result<_>>()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Result<Node> {
        JsonParser.parse(
            Content::Text(text.to_string()),
            &ResolveOpts::default(),
            "application/json",
        )
    }

    #[test]
    fn test_ref_and_query_objects() {
        let node = parse(
            r#"{"db": {"$ref": "./db.json#/primary", "$opts": {"watch": true}},
                "url": {"$query": "'http://' & $ref('#host')"},
                "plain": [1, "two"]}"#,
        )
        .unwrap();

        let Some(Node::Token(Token::Ref(r))) = node.get("db") else {
            panic!("expected ref token at db");
        };
        assert_eq!(r.uri(), "./db.json#/primary");
        assert_eq!(r.opts().watch, Some(true));
        assert!(matches!(node.get("url"), Some(Node::Token(Token::Query(_)))));
        assert_eq!(node.get("plain").unwrap().to_value_lossy(), json!([1, "two"]));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse("{oops").unwrap_err();
        assert!(err.to_string().starts_with("Unable to parse application/json"));
    }

    #[test]
    fn test_suffix_media_types() {
        assert!(JsonParser.can_parse("application/vnd.api+json"));
        assert!(!JsonParser.can_parse("application/yaml"));
    }
}
