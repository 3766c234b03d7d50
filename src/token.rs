//! Indirection tokens embedded in parsed configuration.
//!
//! Parsers turn `@ref <uri> [<json-opts>]`, `@query <expr>`, YAML `!ref` /
//! `!query` tags and JSON `$ref` / `$query` objects into [`Token`] values.
//! The resolver replaces every token with the value it stands for.

use crate::error::{Error, Result};
use crate::opts::ResolveOpts;
use crate::query::{self, QueryHost};
use crate::resolver::{Reference, Resolver};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;

const REF_DIRECTIVE: &str = "@ref";
const QUERY_DIRECTIVE: &str = "@query";

/// A placeholder standing for "resolve me later".
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ref(RefToken),
    Query(QueryToken),
}

/// Points at another source, optionally with a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct RefToken {
    uri: String,
    opts: ResolveOpts,
}

impl RefToken {
    pub fn new(uri: impl Into<String>) -> Result<Self> {
        Self::with_opts(uri, ResolveOpts::default())
    }

    /// Fails with [`Error::InvalidToken`] when `uri` is empty.
    pub fn with_opts(uri: impl Into<String>, opts: ResolveOpts) -> Result<Self> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(Error::InvalidToken("reference uri is empty".to_string()));
        }
        Ok(Self { uri, opts })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn opts(&self) -> &ResolveOpts {
        &self.opts
    }
}

/// An expression evaluated against an empty root with `$ref` available.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryToken {
    query: String,
}

impl QueryToken {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl Token {
    /// Recognize `@ref` / `@query` directives in a string value.
    ///
    /// Returns `Ok(None)` for ordinary strings.
    pub fn parse_directive(raw: &str) -> Result<Option<Token>> {
        if let Some(rest) = strip_directive(raw, REF_DIRECTIVE) {
            let (uri, opts) = match rest.split_once(char::is_whitespace) {
                Some((uri, opts)) if !opts.trim().is_empty() => (uri, Some(opts.trim())),
                Some((uri, _)) => (uri, None),
                None => (rest, None),
            };
            let opts = match opts {
                Some(raw_opts) => {
                    let value: Value = serde_json::from_str(raw_opts).map_err(|e| {
                        Error::InvalidToken(format!("invalid options for {}: {}", uri, e))
                    })?;
                    ResolveOpts::from_value(value).map_err(|e| {
                        Error::InvalidToken(format!("invalid options for {}: {}", uri, e))
                    })?
                }
                None => ResolveOpts::default(),
            };
            return Ok(Some(Token::Ref(RefToken::with_opts(uri, opts)?)));
        }

        if let Some(rest) = strip_directive(raw, QUERY_DIRECTIVE) {
            if rest.is_empty() {
                return Err(Error::InvalidToken("query expression is empty".to_string()));
            }
            return Ok(Some(Token::Query(QueryToken::new(rest))));
        }

        Ok(None)
    }

    /// Resolve this token in the context of the reference it was found in.
    pub fn resolve(
        &self,
        resolver: &Resolver,
        reference: &Arc<Reference>,
    ) -> BoxFuture<'static, Result<Value>> {
        match self {
            Token::Ref(token) => resolver.resolve(&token.uri, token.opts.clone(), Some(reference)),
            Token::Query(token) => {
                let host = ReferenceHost {
                    resolver: resolver.clone(),
                    reference: Arc::clone(reference),
                };
                let expression = token.query.clone();
                async move {
                    query::evaluate(&expression, &Value::Object(Map::new()), &host).await
                }
                .boxed()
            }
        }
    }
}

/// `"@ref"` followed by whitespace or the end of the string.
fn strip_directive<'a>(raw: &'a str, directive: &str) -> Option<&'a str> {
    let rest = raw.trim_start().strip_prefix(directive)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Binds `$ref` inside expressions to the resolver, relative to one reference.
pub(crate) struct ReferenceHost {
    pub(crate) resolver: Resolver,
    pub(crate) reference: Arc<Reference>,
}

impl QueryHost for ReferenceHost {
    fn resolve_ref(&self, uri: &str, opts: ResolveOpts) -> BoxFuture<'static, Result<Value>> {
        self.resolver.resolve(uri, opts, Some(&self.reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_ref_directive() {
        let token = Token::parse_directive("@ref arg:#user-name").unwrap().unwrap();
        let Token::Ref(r) = token else {
            panic!("expected ref token");
        };
        assert_eq!(r.uri(), "arg:#user-name");
        assert_eq!(r.opts(), &ResolveOpts::default());
    }

    #[test]
    fn test_parse_ref_directive_with_opts() {
        let token = Token::parse_directive(r#"@ref ./db.yaml {"watch": false, "contentType": "application/yaml"}"#)
            .unwrap()
            .unwrap();
        let Token::Ref(r) = token else {
            panic!("expected ref token");
        };
        assert_eq!(r.uri(), "./db.yaml");
        assert_eq!(r.opts().watch, Some(false));
        assert_eq!(r.opts().content_type.as_deref(), Some("application/yaml"));
    }

    #[test]
    fn test_parse_query_directive() {
        let token = Token::parse_directive("@query $ref('env:#HOME') & '/data'").unwrap();
        assert_eq!(
            token,
            Some(Token::Query(QueryToken::new("$ref('env:#HOME') & '/data'")))
        );
    }

    #[test]
    fn test_plain_strings_are_not_tokens() {
        assert_eq!(Token::parse_directive("hello").unwrap(), None);
        assert_eq!(Token::parse_directive("@reference").unwrap(), None);
        assert_eq!(Token::parse_directive("me@ref x").unwrap(), None);
    }

    #[test]
    fn test_empty_ref_is_rejected() {
        let err = Token::parse_directive("@ref").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidToken);
        assert!(RefToken::new("").is_err());
    }

    #[test]
    fn test_bad_opts_are_rejected() {
        let err = Token::parse_directive("@ref file:///a.json {oops").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidToken);
    }
}
