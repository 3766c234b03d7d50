//! JSON-Schema validation of candidate configurations.
//!
//! Before validating, the candidate is normalised against the schema:
//! properties not allowed by `additionalProperties: false` are removed (the
//! root always forbids them), missing properties with a `default` are filled
//! in, and scalars are coerced to the declared type where that is lossless
//! (`"8080"` to `8080`, `"true"` to `true`, `1` to `"1"`).

use crate::error::{Error, Result, ValidationIssue};
use crate::path::ConfigPath;
use jsonschema::JSONSchema;
use serde_json::{Map, Number, Value};

/// Accepts or rejects a candidate configuration.
pub trait Validator: Send + Sync {
    /// Return the (possibly normalised) configuration, or
    /// [`Error::Config`] describing why it was rejected.
    fn validate(&self, candidate: Value) -> Result<Value>;
}

pub struct SchemaValidator {
    schema: Value,
    compiled: JSONSchema,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let mut schema = schema.clone();
        if let Value::Object(root) = &mut schema {
            root.insert("additionalProperties".to_string(), Value::Bool(false));
        }
        let compiled = JSONSchema::options()
            .compile(&schema)
            .map_err(|e| Error::Schema(e.to_string()))?;
        Ok(Self { schema, compiled })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    fn normalize(&self, schema: &Value, value: &mut Value) {
        let schema = deref(schema, &self.schema);

        match value {
            Value::Object(map) if is_object_schema(schema) => {
                let properties = properties(schema, &self.schema);

                for (name, sub) in &properties {
                    if !map.contains_key(name.as_str())
                        && let Some(default) = deref(sub, &self.schema).get("default")
                    {
                        map.insert(name.clone(), default.clone());
                    }
                }

                let additional = schema.get("additionalProperties");
                if additional == Some(&Value::Bool(false)) {
                    map.retain(|key, _| properties.iter().any(|(name, _)| name == key));
                }

                for (key, child) in map.iter_mut() {
                    let sub = properties
                        .iter()
                        .find(|(name, _)| name == key)
                        .map(|(_, sub)| *sub)
                        .or(additional.filter(|a| a.is_object()));
                    if let Some(sub) = sub {
                        self.normalize(sub, child);
                    }
                }
            }
            Value::Array(items) => {
                if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                    for item in items.iter_mut() {
                        self.normalize(item_schema, item);
                    }
                }
            }
            scalar => coerce(schema, scalar),
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, candidate: Value) -> Result<Value> {
        let mut value = candidate.clone();
        self.normalize(&self.schema, &mut value);

        let issues: Vec<ValidationIssue> = match self.compiled.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| ValidationIssue {
                    path: ConfigPath::from_pointer(&e.instance_path.to_string())
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                    message: e.to_string(),
                })
                .collect(),
        };
        if issues.is_empty() {
            return Ok(value);
        }
        Err(Error::config(issues, candidate))
    }
}

/// Accepts any candidate unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, candidate: Value) -> Result<Value> {
        Ok(candidate)
    }
}

/// Follow a local `$ref` (`#/definitions/...`, `#/$defs/...`).
pub(crate) fn deref<'a>(schema: &'a Value, root: &'a Value) -> &'a Value {
    let mut current = schema;
    // Bounded to survive self-referencing definitions
    for _ in 0..32 {
        let Some(target) = current
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|r| r.strip_prefix('#'))
            .and_then(|pointer| root.pointer(pointer))
        else {
            break;
        };
        current = target;
    }
    current
}

/// Declared types of a schema node.
pub(crate) fn types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn is_object_schema(schema: &Value) -> bool {
    types(schema).contains(&"object")
        || schema.get("properties").is_some()
        || schema.get("additionalProperties").is_some_and(Value::is_object)
}

pub(crate) fn is_array_schema(schema: &Value) -> bool {
    types(schema).contains(&"array") || schema.get("items").is_some()
}

/// Properties of an object schema, including those declared under
/// `allOf` / `anyOf` / `oneOf`. Earlier declarations win.
pub(crate) fn properties<'a>(schema: &'a Value, root: &'a Value) -> Vec<(String, &'a Value)> {
    let mut out: Vec<(String, &Value)> = Vec::new();
    collect_properties(schema, root, &mut out, 0);
    out
}

fn collect_properties<'a>(
    schema: &'a Value,
    root: &'a Value,
    out: &mut Vec<(String, &'a Value)>,
    depth: usize,
) {
    if depth > 16 {
        return;
    }
    let schema = deref(schema, root);
    if let Some(Value::Object(props)) = schema.get("properties") {
        for (name, sub) in props {
            if !out.iter().any(|(n, _)| n == name) {
                out.push((name.clone(), sub));
            }
        }
    }
    for keyword in ["allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = schema.get(keyword) {
            for branch in branches {
                collect_properties(branch, root, out, depth + 1);
            }
        }
    }
}

/// Coerce a scalar towards the first declared type it can become.
fn coerce(schema: &Value, value: &mut Value) {
    let types = types(schema);
    if types.is_empty() || types.iter().any(|t| matches_type(t, value)) {
        return;
    }
    for t in types {
        if let Some(coerced) = coerce_to(t, value) {
            *value = coerced;
            return;
        }
    }
}

fn matches_type(t: &str, value: &Value) -> bool {
    match t {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => false,
    }
}

fn coerce_to(t: &str, value: &Value) -> Option<Value> {
    match (t, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => {
            let f = s.trim().parse::<f64>().ok().filter(|f| f.is_finite())?;
            number(f)
        }
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("integer", Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::from(f as i64)),
        ("number" | "integer", Value::Bool(b)) => Some(Value::from(u8::from(*b))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

fn number(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

/// Empty object, the candidate when nothing is configured.
pub(crate) fn empty() -> Value {
    Value::Object(Map::new())
}
