//! Environment parser.
//!
//! Accepts either the structured map produced by the environment reader or
//! dotenv text, parsed with `dotenvy`. Values of the form `@ref <uri> [opts]`
//! and `@query <expr>` become tokens. Queries that call `$` functions must be
//! single-quoted in dotenv files, otherwise `$name` is substituted.

use super::{Parser, content_text, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Content;
use crate::readers::env::ENV_CONTENT_TYPE;
use crate::token::Token;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvParser;

impl Parser for EnvParser {
    fn name(&self) -> &'static str {
        "env"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(content_type, &[ENV_CONTENT_TYPE, "text/x-dotenv"])
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let node = match content {
            Content::Structured(node) => node,
            other => Node::Object(
                parse_dotenv(&content_text(other, content_type)?, content_type)?
                    .into_iter()
                    .map(|(k, v)| (k, Node::String(v)))
                    .collect(),
            ),
        };
        node.try_map_strings(&mut directive_or_string)
    }
}

pub(super) fn directive_or_string(value: String) -> Result<Node> {
    Ok(match Token::parse_directive(&value)? {
        Some(token) => Node::Token(token),
        None => Node::String(value),
    })
}

/// Parse dotenv text into a map; later assignments win.
pub fn parse_dotenv(text: &str, content_type: &str) -> Result<BTreeMap<String, String>> {
    dotenvy::from_read_iter(text.as_bytes())
        .map(|line| line.map_err(|e| Error::parse(content_type, e)))
        .collect()
}
