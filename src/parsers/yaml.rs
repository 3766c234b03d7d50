//! YAML parser with `!ref` and `!query` tags.
//!
//! `!ref <uri>`, `!ref {uri: ..., opts: {...}}` and `!query <expr>` become
//! tokens.

use super::{Parser, content_text, float_number, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Content;
use crate::token::{QueryToken, RefToken, Token};
use serde_yaml::Value as Yaml;
use serde_yaml::value::TaggedValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl Parser for YamlParser {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(
            content_type,
            &["application/yaml", "application/x-yaml", "text/yaml", "text/x-yaml"],
        )
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let text = content_text(content, content_type)?;
        let value: Yaml = serde_yaml::from_str(&text).map_err(|e| Error::parse(content_type, e))?;
        to_node(value, content_type)
    }
}

fn to_node(value: Yaml, content_type: &str) -> Result<Node> {
    Ok(match value {
        Yaml::Null => Node::Null,
        Yaml::Bool(b) => Node::Bool(b),
        Yaml::Number(n) => number_node(&n),
        Yaml::String(s) => Node::String(s),
        Yaml::Sequence(items) => Node::Array(
            items
                .into_iter()
                .map(|item| to_node(item, content_type))
                .collect::<Result<_>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, value) in mapping {
                map.insert(key_string(key, content_type)?, to_node(value, content_type)?);
            }
            Node::Object(map)
        }
        Yaml::Tagged(tagged) => tagged_node(*tagged, content_type)?,
    })
}

fn tagged_node(tagged: TaggedValue, content_type: &str) -> Result<Node> {
    let tag = tagged.tag.to_string();
    match (tag.trim_start_matches('!'), tagged.value) {
        ("ref", Yaml::String(uri)) => Ok(Token::Ref(RefToken::new(uri)?).into()),
        ("ref", Yaml::Mapping(mapping)) => {
            let uri = match mapping.get("uri") {
                Some(Yaml::String(uri)) => uri.clone(),
                _ => {
                    return Err(Error::InvalidToken(
                        "!ref mapping requires a string 'uri'".to_string(),
                    ));
                }
            };
            let opts = match mapping.get("opts") {
                Some(raw) => {
                    let json = serde_json::to_value(raw)
                        .map_err(|e| Error::InvalidToken(format!("invalid !ref opts: {}", e)))?;
                    ResolveOpts::from_value(json)
                        .map_err(|e| Error::InvalidToken(format!("invalid !ref opts: {}", e)))?
                }
                None => ResolveOpts::default(),
            };
            Ok(Token::Ref(RefToken::with_opts(uri, opts)?).into())
        }
        ("query", Yaml::String(query)) => Ok(Token::Query(QueryToken::new(query)).into()),
        (name @ ("ref" | "query"), _) => Err(Error::InvalidToken(format!(
            "unsupported value for !{} tag",
            name
        ))),
        // Unknown tags keep their value
        (_, value) => to_node(value, content_type),
    }
}

fn number_node(n: &serde_yaml::Number) -> Node {
    if let Some(i) = n.as_i64() {
        Node::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Node::Number(u.into())
    } else {
        n.as_f64()
            .and_then(float_number)
            .map_or(Node::Null, Node::Number)
    }
}

fn key_string(key: Yaml, content_type: &str) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(Error::parse(
            content_type,
            format!("unsupported mapping key {:?}", other),
        )),
    }
}
