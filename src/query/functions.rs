//! Built-in `$functions` available to expressions.

use super::QueryError;
use super::parser::number_value;
use serde_json::{Map, Value};

type FnResult = Result<Option<Value>, QueryError>;

pub fn call(name: &str, args: Vec<Option<Value>>) -> FnResult {
    match name {
        "string" => Ok(arg(&args, 0).map(|v| Value::String(stringify(Some(v))))),
        "number" => to_number(arg(&args, 0)),
        "boolean" => Ok(arg(&args, 0).map(|v| Value::Bool(truthy(Some(v))))),
        "not" => Ok(Some(Value::Bool(!truthy(arg(&args, 0))))),
        "exists" => Ok(Some(Value::Bool(arg(&args, 0).is_some()))),
        "lowercase" => map_string(name, arg(&args, 0), |s| s.to_lowercase()),
        "uppercase" => map_string(name, arg(&args, 0), |s| s.to_uppercase()),
        "trim" => map_string(name, arg(&args, 0), |s| {
            s.split_whitespace().collect::<Vec<_>>().join(" ")
        }),
        "length" => match arg(&args, 0) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(Value::from(s.chars().count()))),
            Some(Value::Array(items)) => Ok(Some(Value::from(items.len()))),
            Some(other) => Err(type_error(name, "a string or array", other)),
        },
        "count" => Ok(Some(Value::from(match arg(&args, 0) {
            None => 0,
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
        }))),
        "split" => split(arg(&args, 0), arg(&args, 1)),
        "join" => join(arg(&args, 0), arg(&args, 1)),
        "keys" => match arg(&args, 0) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            ))),
            Some(other) => Err(type_error(name, "an object", other)),
        },
        "merge" => merge(arg(&args, 0)),
        other => Err(QueryError::Eval(format!("unknown function ${}", other))),
    }
}

fn arg(args: &[Option<Value>], index: usize) -> Option<&Value> {
    args.get(index).and_then(Option::as_ref)
}

/// JSONata truthiness: empty strings, zero, empty containers and null are false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => items.iter().any(|item| truthy(Some(item))),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// String form used by `&` and `$string`; undefined becomes empty.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn to_number(value: Option<&Value>) -> FnResult {
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(Value::Number(n.clone()))),
        Some(Value::Bool(b)) => Ok(Some(Value::from(u8::from(*b)))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|n| Some(number_value(n)))
            .map_err(|_| QueryError::Eval(format!("unable to cast '{}' to a number", s))),
        Some(other) => Err(type_error("number", "a scalar", other)),
    }
}

fn map_string(name: &str, value: Option<&Value>, f: impl FnOnce(&str) -> String) -> FnResult {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(Value::String(f(s)))),
        Some(other) => Err(type_error(name, "a string", other)),
    }
}

fn split(value: Option<&Value>, separator: Option<&Value>) -> FnResult {
    let Some(value) = value else {
        return Ok(None);
    };
    let (Value::String(s), Some(Value::String(sep))) = (value, separator) else {
        return Err(QueryError::Eval(
            "$split expects a string and a separator string".to_string(),
        ));
    };
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
    };
    Ok(Some(Value::Array(parts)))
}

fn join(value: Option<&Value>, separator: Option<&Value>) -> FnResult {
    let Some(value) = value else {
        return Ok(None);
    };
    let Value::Array(items) = value else {
        return Err(type_error("join", "an array", value));
    };
    let sep = match separator {
        None => "",
        Some(Value::String(sep)) => sep.as_str(),
        Some(other) => return Err(type_error("join", "a separator string", other)),
    };
    let parts: Vec<String> = items.iter().map(|item| stringify(Some(item))).collect();
    Ok(Some(Value::String(parts.join(sep))))
}

/// Shallow merge of an array of objects, later keys winning.
fn merge(value: Option<&Value>) -> FnResult {
    let objects: Vec<&Value> = match value {
        None => return Ok(None),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };
    let mut out = Map::new();
    for object in objects {
        let Value::Object(map) = object else {
            return Err(type_error("merge", "objects", object));
        };
        for (k, v) in map {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Some(Value::Object(out)))
}

fn type_error(name: &str, expected: &str, got: &Value) -> QueryError {
    QueryError::Eval(format!("${} expects {}, got {}", name, expected, got))
}
