//! Query expressions for `@query` tokens and non-pointer fragments.
//!
//! A small JSONata-flavoured language: field paths (`a.b[0]`, `` `user-name` ``),
//! `$` for the input, literals, `&` concatenation, arithmetic, comparisons,
//! `and` / `or`, `cond ? a : b`, array and object constructors, and `$fn(...)`
//! calls. `$ref(uri, opts?)` pulls in another source through the resolver.

mod eval;
mod functions;
mod lexer;
mod parser;

pub use parser::{BinaryOp, Expr, Parser};

use crate::error::{Error, Result};
use crate::opts::ResolveOpts;
use eval::Evaluator;
use futures::future::BoxFuture;
use serde_json::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("{0}")]
    Eval(String),

    /// A `$ref` call failed; surfaced unchanged to the caller.
    #[error(transparent)]
    Resolve(Error),
}

impl QueryError {
    fn into_error(self, expression: &str) -> Error {
        match self {
            QueryError::Resolve(err) => err,
            other => Error::query(expression, other),
        }
    }
}

/// Access to other sources from inside an expression.
pub trait QueryHost: Send + Sync {
    fn resolve_ref(&self, uri: &str, opts: ResolveOpts) -> BoxFuture<'static, Result<Value>>;
}

/// Evaluate `expression` against `input`. An undefined result is `null`.
pub async fn evaluate(expression: &str, input: &Value, host: &dyn QueryHost) -> Result<Value> {
    Ok(evaluate_optional(expression, input, host)
        .await?
        .unwrap_or(Value::Null))
}

/// Evaluate `expression`, returning `None` when the result is undefined
/// (for example a path that does not exist).
pub async fn evaluate_optional(
    expression: &str,
    input: &Value,
    host: &dyn QueryHost,
) -> Result<Option<Value>> {
    let expr = Parser::parse(expression).map_err(|e| e.into_error(expression))?;
    Evaluator::new(host)
        .eval(&expr, input)
        .await
        .map_err(|e| e.into_error(expression))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures::FutureExt;
    use std::collections::HashMap;

    /// Serves `$ref` calls from a fixed table.
    #[derive(Default)]
    pub struct StaticHost(pub HashMap<String, Value>);

    impl QueryHost for StaticHost {
        fn resolve_ref(&self, uri: &str, _opts: ResolveOpts) -> BoxFuture<'static, Result<Value>> {
            let found = self.0.get(uri).cloned().ok_or_else(|| Error::NoReader {
                uri: uri.to_string(),
            });
            async move { found }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticHost;
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use std::collections::HashMap;

    async fn eval(expression: &str, input: Value) -> Result<Value> {
        evaluate(expression, &input, &StaticHost::default()).await
    }

    #[tokio::test]
    async fn test_paths_and_concat() {
        let input = json!({"db": {"host": "localhost", "port": 5432}});
        assert_eq!(
            eval("db.host & ':' & db.port", input).await.unwrap(),
            json!("localhost:5432")
        );
    }

    #[tokio::test]
    async fn test_missing_path_is_undefined() {
        let input = json!({"a": 1});
        let result = evaluate_optional("b.c", &input, &StaticHost::default())
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_ref_function_uses_host() {
        let mut table = HashMap::new();
        table.insert("env:#HOME".to_string(), json!("/home/me"));
        let host = StaticHost(table);
        let result = evaluate("$ref('env:#HOME') & '/data'", &json!({}), &host)
            .await
            .unwrap();
        assert_eq!(result, json!("/home/me/data"));
    }

    #[tokio::test]
    async fn test_ref_errors_pass_through() {
        let err = eval("$ref('nope:x')", json!({})).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoReader);
    }

    #[tokio::test]
    async fn test_syntax_error_is_query_error() {
        let err = eval("1 +", json!({})).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::QueryFailed);
    }
}
