//! Schema-guided mapping of flat keys to nested paths.
//!
//! Environment variables and command-line options are flat:
//! `APP_DB_HOST=x` or `--db-host x`. Each key is matched against the schema,
//! property by property, so that `DB_HOST` lands at `db.host` and
//! `CREATED_AT` at `createdAt`. Keys the schema does not describe are split
//! on the delimiter.

use super::schema::{deref, is_array_schema, is_object_schema, properties};
use crate::path::{ConfigPath, Segment};
use heck::{ToKebabCase, ToSnakeCase};
use serde_json::{Map, Value};

/// Nest every entry of `flat` according to `schema`.
pub fn unflat(flat: &Map<String, Value>, delimiter: &str, schema: &Value) -> Value {
    let mut out = Value::Object(Map::new());
    for (key, value) in flat {
        let path = flat_path(key, delimiter, schema);
        path.set(&mut out, value.clone());
    }
    out
}

/// Resolve one flat key to a path.
pub fn flat_path(key: &str, delimiter: &str, schema: &Value) -> ConfigPath {
    let mut segments = Vec::new();
    resolve(key, delimiter, schema, schema, &mut segments);
    segments.into_iter().collect()
}

fn resolve(path: &str, delimiter: &str, schema: &Value, root: &Value, out: &mut Vec<Segment>) {
    if path.is_empty() {
        return;
    }
    if delimiter.is_empty() {
        out.push(Segment::Key(path.to_string()));
        return;
    }
    let schema = deref(schema, root);

    if is_object_schema(schema) {
        if let Some((name, sub, rest)) = match_property(path, delimiter, schema, root) {
            out.push(Segment::Key(name));
            resolve(rest, delimiter, sub, root, out);
            return;
        }
        if let Some(additional) = schema.get("additionalProperties").filter(|a| a.is_object()) {
            let additional = deref(additional, root);
            if !is_object_schema(additional) && !is_array_schema(additional) {
                out.push(Segment::Key(path.to_string()));
                return;
            }
            let (key, rest) = split_first(path, delimiter);
            out.push(Segment::Key(key.to_string()));
            resolve(rest, delimiter, additional, root, out);
            return;
        }
    }

    if is_array_schema(schema) {
        let (index, rest) = split_first(path, delimiter);
        out.push(segment(index));
        let items = schema.get("items").unwrap_or(&Value::Null);
        resolve(rest, delimiter, items, root, out);
        return;
    }

    out.extend(path.split(delimiter).map(segment));
}

/// Longest property (or its snake/kebab form) that prefixes `path`,
/// ignoring case, followed by the delimiter or the end.
fn match_property<'a, 'p>(
    path: &'p str,
    delimiter: &str,
    schema: &'a Value,
    root: &'a Value,
) -> Option<(String, &'a Value, &'p str)> {
    let mut best: Option<(usize, String, &'a Value, &'p str)> = None;

    for (name, sub) in properties(schema, root) {
        for form in [name.clone(), name.to_snake_case(), name.to_kebab_case()] {
            let Some(head) = path.get(..form.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(&form) {
                continue;
            }
            let tail = &path[form.len()..];
            let rest = if tail.is_empty() {
                tail
            } else if let Some(rest) = tail.strip_prefix(delimiter) {
                rest
            } else {
                continue;
            };
            if best.as_ref().is_none_or(|(len, ..)| form.len() > *len) {
                best = Some((form.len(), name.clone(), sub, rest));
            }
        }
    }

    best.map(|(_, name, sub, rest)| (name, sub, rest))
}

fn split_first<'p>(path: &'p str, delimiter: &str) -> (&'p str, &'p str) {
    path.split_once(delimiter).unwrap_or((path, ""))
}

fn segment(part: &str) -> Segment {
    match part.parse::<usize>() {
        Ok(index) => Segment::Index(index),
        Err(_) => Segment::Key(part.to_string()),
    }
}
