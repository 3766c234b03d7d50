//! Async evaluation of parsed expressions.
//!
//! `None` stands for "undefined" (a missing path), which is distinct from
//! an explicit `null`.

use super::functions;
use super::parser::{BinaryOp, Expr, number_value};
use super::{QueryError, QueryHost};
use crate::opts::ResolveOpts;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

const MAX_RECURSION_DEPTH: usize = 256;

type EvalResult = Result<Option<Value>, QueryError>;

pub struct Evaluator<'h> {
    host: &'h dyn QueryHost,
}

impl<'h> Evaluator<'h> {
    pub fn new(host: &'h dyn QueryHost) -> Self {
        Self { host }
    }

    pub async fn eval(&self, expr: &Expr, input: &Value) -> EvalResult {
        self.eval_with_depth(expr, input, 0).await
    }

    fn eval_with_depth<'a>(
        &'a self,
        expr: &'a Expr,
        input: &'a Value,
        depth: usize,
    ) -> BoxFuture<'a, EvalResult> {
        async move {
            if depth > MAX_RECURSION_DEPTH {
                return Err(QueryError::Eval(format!(
                    "maximum recursion depth ({}) exceeded",
                    MAX_RECURSION_DEPTH
                )));
            }

            match expr {
                Expr::Literal(value) => Ok(Some(value.clone())),

                Expr::Context => Ok(Some(input.clone())),

                Expr::Field(name) => Ok(access_property(input, name)),

                Expr::Variable(name) => Err(QueryError::Eval(format!(
                    "unknown variable ${}",
                    name
                ))),

                Expr::Negate(inner) => match self.eval_with_depth(inner, input, depth + 1).await? {
                    None => Ok(None),
                    Some(value) => {
                        let n = value.as_f64().ok_or_else(|| {
                            QueryError::Eval(format!("cannot negate {}", value))
                        })?;
                        Ok(Some(number_value(-n)))
                    }
                },

                Expr::Binary { left, op, right } => {
                    self.eval_binary(*op, left, right, input, depth).await
                }

                Expr::PropertyAccess { object, property } => {
                    let target = self.eval_with_depth(object, input, depth + 1).await?;
                    Ok(target.and_then(|t| access_property(&t, property)))
                }

                Expr::IndexAccess { object, index } => {
                    let target = self.eval_with_depth(object, input, depth + 1).await?;
                    let index = self.eval_with_depth(index, input, depth + 1).await?;
                    Ok(match (target, index) {
                        (Some(target), Some(index)) => access_index(&target, &index),
                        _ => None,
                    })
                }

                Expr::FunctionCall { name, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval_with_depth(arg, input, depth + 1).await?);
                    }
                    if name == "ref" {
                        return self.call_ref(values).await;
                    }
                    functions::call(name, values)
                }

                Expr::Conditional {
                    condition,
                    then_expr,
                    else_expr,
                } => {
                    let condition = self.eval_with_depth(condition, input, depth + 1).await?;
                    if functions::truthy(condition.as_ref()) {
                        self.eval_with_depth(then_expr, input, depth + 1).await
                    } else if let Some(else_expr) = else_expr {
                        self.eval_with_depth(else_expr, input, depth + 1).await
                    } else {
                        Ok(None)
                    }
                }

                Expr::Array(elements) => {
                    let mut out = Vec::with_capacity(elements.len());
                    for element in elements {
                        if let Some(value) = self.eval_with_depth(element, input, depth + 1).await? {
                            out.push(value);
                        }
                    }
                    Ok(Some(Value::Array(out)))
                }

                Expr::Object(pairs) => {
                    let mut out = Map::new();
                    for (key, value) in pairs {
                        let key = match self.eval_with_depth(key, input, depth + 1).await? {
                            Some(Value::String(s)) => s,
                            other => {
                                return Err(QueryError::Eval(format!(
                                    "object key must be a string, got {:?}",
                                    other
                                )));
                            }
                        };
                        if let Some(value) = self.eval_with_depth(value, input, depth + 1).await? {
                            out.insert(key, value);
                        }
                    }
                    Ok(Some(Value::Object(out)))
                }
            }
        }
        .boxed()
    }

    async fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        input: &Value,
        depth: usize,
    ) -> EvalResult {
        let lhs = self.eval_with_depth(left, input, depth + 1).await?;

        // Short-circuit logical operators
        match op {
            BinaryOp::And if !functions::truthy(lhs.as_ref()) => {
                return Ok(Some(Value::Bool(false)));
            }
            BinaryOp::Or if functions::truthy(lhs.as_ref()) => {
                return Ok(Some(Value::Bool(true)));
            }
            _ => {}
        }

        let rhs = self.eval_with_depth(right, input, depth + 1).await?;

        match op {
            BinaryOp::And | BinaryOp::Or => Ok(Some(Value::Bool(functions::truthy(rhs.as_ref())))),
            BinaryOp::Concat => {
                let mut out = functions::stringify(lhs.as_ref());
                out.push_str(&functions::stringify(rhs.as_ref()));
                Ok(Some(Value::String(out)))
            }
            BinaryOp::Equal => Ok(Some(Value::Bool(match (&lhs, &rhs) {
                (Some(a), Some(b)) => values_equal(a, b),
                _ => false,
            }))),
            BinaryOp::NotEqual => Ok(Some(Value::Bool(match (&lhs, &rhs) {
                (Some(a), Some(b)) => !values_equal(a, b),
                _ => false,
            }))),
            BinaryOp::LessThan
            | BinaryOp::LessEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterEqual => {
                let (Some(a), Some(b)) = (lhs, rhs) else {
                    return Ok(Some(Value::Bool(false)));
                };
                compare(op, &a, &b).map(|b| Some(Value::Bool(b)))
            }
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                let (Some(a), Some(b)) = (lhs, rhs) else {
                    return Ok(None);
                };
                arithmetic(op, &a, &b).map(Some)
            }
        }
    }

    async fn call_ref(&self, args: Vec<Option<Value>>) -> EvalResult {
        let mut args = args.into_iter();
        let uri = match args.next().flatten() {
            Some(Value::String(uri)) => uri,
            other => {
                return Err(QueryError::Eval(format!(
                    "$ref expects a uri string, got {:?}",
                    other
                )));
            }
        };
        let opts = match args.next().flatten() {
            Some(value) => ResolveOpts::from_value(value)
                .map_err(|e| QueryError::Eval(format!("invalid $ref options: {}", e)))?,
            None => ResolveOpts::default(),
        };
        self.host
            .resolve_ref(&uri, opts)
            .await
            .map(Some)
            .map_err(QueryError::Resolve)
    }
}

/// Field lookup; on arrays the lookup maps over the elements.
fn access_property(target: &Value, property: &str) -> Option<Value> {
    match target {
        Value::Object(map) => map.get(property).cloned(),
        Value::Array(items) => {
            let mapped: Vec<Value> = items
                .iter()
                .filter_map(|item| access_property(item, property))
                .collect();
            if mapped.is_empty() {
                None
            } else {
                Some(Value::Array(mapped))
            }
        }
        _ => None,
    }
}

fn access_index(target: &Value, index: &Value) -> Option<Value> {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_f64()?.floor() as i64;
            let i = if i < 0 { items.len() as i64 + i } else { i };
            usize::try_from(i).ok().and_then(|i| items.get(i)).cloned()
        }
        (Value::Object(map), Value::String(key)) => map.get(key).cloned(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<bool, QueryError> {
    let ordering = match (a, b) {
        (Value::Number(_), Value::Number(_)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
    .ok_or_else(|| QueryError::Eval(format!("cannot compare {} and {}", a, b)))?;

    Ok(match op {
        BinaryOp::LessThan => ordering.is_lt(),
        BinaryOp::LessEqual => ordering.is_le(),
        BinaryOp::GreaterThan => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, QueryError> {
    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(QueryError::Eval(format!(
            "arithmetic on non-numbers {} and {}",
            a, b
        )));
    };
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide if y == 0.0 => {
            return Err(QueryError::Eval("division by zero".to_string()));
        }
        BinaryOp::Divide => x / y,
        BinaryOp::Modulo if y == 0.0 => {
            return Err(QueryError::Eval("modulo by zero".to_string()));
        }
        _ => x % y,
    };
    Ok(number_value(result))
}
