//! TOML parser. Tables shaped like `{ "$ref" = ..., "$opts" = {...} }` or
//! `{ "$query" = ... }` become tokens, as in JSON.

use super::{Parser, content_text, float_number, json, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Content;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct TomlParser;

impl Parser for TomlParser {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(content_type, &["application/toml", "text/toml", "text/x-toml"])
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let text = content_text(content, content_type)?;
        let table: toml::Table = toml::from_str(&text).map_err(|e| Error::parse(content_type, e))?;
        json::to_node(table_to_json(table))
    }
}

fn table_to_json(table: toml::Table) -> Value {
    Value::Object(
        table
            .into_iter()
            .map(|(k, v)| (k, to_json(v)))
            .collect::<Map<_, _>>(),
    )
}

fn to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => float_number(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        toml::Value::Table(table) => table_to_json(table),
    }
}
