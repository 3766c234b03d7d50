//! INI parser.
//!
//! Sections nest on `.` (`[server.tls]`), `key[]` collects an array, and the
//! bare words `true`, `false` and `null` become their JSON values. As in
//! dotenv files, `@ref` and `@query` values become tokens.

use super::env::directive_or_string;
use super::{Parser, content_text, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::path::ConfigPath;
use crate::readers::Content;
use ini::Ini;
use serde_json::{Map, Value};

pub const INI_CONTENT_TYPE: &str = "application/x.ini";

#[derive(Debug, Clone, Copy, Default)]
pub struct IniParser;

impl Parser for IniParser {
    fn name(&self) -> &'static str {
        "ini"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(content_type, &[INI_CONTENT_TYPE, "text/x-ini"])
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let text = content_text(content, content_type)?;
        let ini = Ini::load_from_str(&text).map_err(|e| Error::parse(content_type, e))?;

        let mut root = Value::Object(Map::new());
        for (section, properties) in ini.iter() {
            let path = match section {
                Some(name) => ConfigPath::from_iter(name.split('.').map(|part| part.trim().into())),
                None => ConfigPath::root(),
            };
            let mut table = match path.get(&root) {
                Some(Value::Object(existing)) => existing.clone(),
                _ => Map::new(),
            };
            for (key, raw) in properties.iter() {
                let value = scalar(raw);
                match key.strip_suffix("[]") {
                    Some(key) => match table.get_mut(key) {
                        Some(Value::Array(items)) => items.push(value),
                        _ => {
                            table.insert(key.to_string(), Value::Array(vec![value]));
                        }
                    },
                    None => {
                        table.insert(key.to_string(), value);
                    }
                }
            }
            path.set(&mut root, Value::Object(table));
        }

        Node::from(root).try_map_strings(&mut directive_or_string)
    }
}

fn scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;
    use serde_json::json;

    fn parse(text: &str) -> Result<Node> {
        IniParser.parse(
            Content::Text(text.to_string()),
            &ResolveOpts::default(),
            INI_CONTENT_TYPE,
        )
    }

    #[test]
    fn test_sections_and_values() {
        let node = parse(
            "name = svc\n\
             debug = true\n\
             \n\
             [server]\n\
             port = 8080\n\
             \n\
             [server.tls]\n\
             enabled = false\n\
             \n\
             [hosts]\n\
             list[] = a\n\
             list[] = b\n",
        )
        .unwrap();
        assert_eq!(
            node.to_value_lossy(),
            json!({
                "name": "svc",
                "debug": true,
                "server": {"port": "8080", "tls": {"enabled": false}},
                "hosts": {"list": ["a", "b"]}
            })
        );
    }

    #[test]
    fn test_directive_values_become_tokens() {
        let node = parse("[db]\npassword = @ref env:DB_PASSWORD\n").unwrap();
        let Some(Node::Object(db)) = node.get("db") else {
            panic!("expected db section");
        };
        let Some(Node::Token(Token::Ref(r))) = db.get("password") else {
            panic!("expected ref token at db.password");
        };
        assert_eq!(r.uri(), "env:DB_PASSWORD");
    }

    #[test]
    fn test_content_type() {
        assert!(IniParser.can_parse("application/x.ini; charset=utf-8"));
        assert!(!IniParser.can_parse("application/toml"));
    }
}
