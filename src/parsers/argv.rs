//! Command-line argument parser with minimist-style rules.
//!
//! - `--key=value` and `--key value` set `key`
//! - `--flag` alone (or before another option) sets `true`, `--no-flag` sets `false`
//! - `-abc` sets each short flag; the last one may take the following value
//! - numeric-looking values become numbers, repeated keys collect into arrays
//! - dotted keys nest, positionals and anything after `--` are dropped
//!
//! String values of the form `@ref <uri> [opts]` / `@query <expr>` become tokens.

use super::{Parser, content_text, float_number, media_type_is};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Content;
use crate::readers::argv::ARGV_CONTENT_TYPE;
use crate::token::Token;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArgvParser;

impl Parser for ArgvParser {
    fn name(&self) -> &'static str {
        "argv"
    }

    fn can_parse(&self, content_type: &str) -> bool {
        media_type_is(content_type, &[ARGV_CONTENT_TYPE])
    }

    fn parse(&self, content: Content, _opts: &ResolveOpts, content_type: &str) -> Result<Node> {
        let args = match content {
            Content::Structured(Node::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Node::String(s) => Ok(s),
                    other => Err(Error::parse(
                        content_type,
                        format!("expected string argument, got {:?}", other),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            Content::Structured(_) => {
                return Err(Error::parse(content_type, "expected an argument list"));
            }
            other => split_words(&content_text(other, content_type)?),
        };
        parse_args(&args)
    }
}

/// Parse an argument list into an object node.
pub fn parse_args(args: &[String]) -> Result<Node> {
    let mut out = BTreeMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        i += 1;

        if arg == "--" {
            break;
        }

        if let Some(long) = arg.strip_prefix("--") {
            if let Some((key, value)) = long.split_once('=') {
                set_key(&mut out, key, scalar(value)?);
            } else if let Some(key) = long.strip_prefix("no-") {
                set_key(&mut out, key, Node::Bool(false));
            } else if let Some(next) = args.get(i).filter(|next| takes_value(next)) {
                i += 1;
                set_key(&mut out, long, scalar(next)?);
            } else {
                set_key(&mut out, long, Node::Bool(true));
            }
            continue;
        }

        if let Some(short) = arg.strip_prefix('-')
            && !short.is_empty()
            && !is_number(arg)
        {
            if let Some((key, value)) = short.split_once('=') {
                set_key(&mut out, key, scalar(value)?);
                continue;
            }
            let letters: Vec<(usize, char)> = short.char_indices().collect();
            for (pos, (offset, letter)) in letters.iter().enumerate() {
                let rest = &short[offset + letter.len_utf8()..];
                let key = letter.to_string();
                if !rest.is_empty() && is_number(rest) {
                    // -n5
                    set_key(&mut out, &key, scalar(rest)?);
                    break;
                }
                let last = pos + 1 == letters.len();
                if last && let Some(next) = args.get(i).filter(|next| takes_value(next)) {
                    i += 1;
                    set_key(&mut out, &key, scalar(next)?);
                } else {
                    set_key(&mut out, &key, Node::Bool(true));
                }
            }
        }
        // Positionals are not part of configuration
    }

    Ok(Node::Object(out))
}

fn takes_value(next: &str) -> bool {
    !next.starts_with('-') || is_number(next)
}

fn scalar(raw: &str) -> Result<Node> {
    if let Some(token) = Token::parse_directive(raw)? {
        return Ok(Node::Token(token));
    }
    Ok(match raw {
        "true" => Node::Bool(true),
        "false" => Node::Bool(false),
        _ if is_number(raw) => raw
            .parse::<i64>()
            .ok()
            .map(serde_json::Number::from)
            .or_else(|| raw.parse::<f64>().ok().and_then(float_number))
            .map_or_else(|| Node::String(raw.to_string()), Node::Number),
        _ => Node::String(raw.to_string()),
    })
}

fn is_number(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && raw.parse::<f64>().is_ok()
}

fn set_key(out: &mut BTreeMap<String, Node>, key: &str, value: Node) {
    let mut parts = key.split('.').peekable();
    let mut current = out;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            insert_repeated(current, part, value);
            return;
        }
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Node::Object(BTreeMap::new()));
        if !matches!(entry, Node::Object(_)) {
            *entry = Node::Object(BTreeMap::new());
        }
        let Node::Object(next) = entry else {
            return;
        };
        current = next;
    }
}

fn insert_repeated(map: &mut BTreeMap<String, Node>, key: &str, value: Node) {
    match map.remove(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Node::Array(mut items)) => {
            items.push(value);
            map.insert(key.to_string(), Node::Array(items));
        }
        Some(previous) => {
            map.insert(key.to_string(), Node::Array(vec![previous, value]));
        }
    }
}

/// Split a command line into words, honouring single and double quotes.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                    in_word = true;
                }
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
