//! Structural paths into configuration values.
//!
//! A [`ConfigPath`] is a sequence of object keys and array indices. It is
//! rendered dotted (`users.0.name`) for path-scoped listeners and as an
//! RFC-6901 pointer (`/users/0/name`) when serialized.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// One step of a [`ConfigPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// Numeric view of the segment, used when the target is an array.
    fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            Segment::Key(k) => k.parse().ok(),
        }
    }

    fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Key(s.to_string())
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

/// How far past the end of an array [`ConfigPath::set`] will pad.
pub const MAX_INDEX_GAP: usize = 1024;

fn fits(index: usize, len: usize) -> bool {
    index
        .checked_add(1)
        .is_some_and(|needed| needed <= len.saturating_add(MAX_INDEX_GAP))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath(Vec<Segment>);

impl ConfigPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut next = self.clone();
        next.push(segment);
        next
    }

    /// Every non-empty prefix from the first segment down to the full path.
    pub fn prefixes(&self) -> impl Iterator<Item = ConfigPath> + '_ {
        (1..=self.0.len()).map(|n| ConfigPath(self.0[..n].to_vec()))
    }

    /// Parse an RFC-6901 pointer. Numeric tokens become indices.
    pub fn from_pointer(pointer: &str) -> Option<Self> {
        if pointer.is_empty() {
            return Some(Self::root());
        }
        let rest = pointer.strip_prefix('/')?;
        let segments = rest
            .split('/')
            .map(|raw| {
                let token = raw.replace("~1", "/").replace("~0", "~");
                match token.parse::<usize>() {
                    Ok(i) if !token.starts_with('+') => Segment::Index(i),
                    _ => Segment::Key(token),
                }
            })
            .collect();
        Some(Self(segments))
    }

    /// Parse a dotted path (`users.0.name`).
    pub fn from_dotted(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(
            dotted
                .split('.')
                .map(|part| match part.parse::<usize>() {
                    Ok(i) => Segment::Index(i),
                    Err(_) => Segment::Key(part.to_string()),
                })
                .collect(),
        )
    }

    pub fn to_pointer(&self) -> String {
        self.0
            .iter()
            .map(|s| format!("/{}", s.as_key().replace('~', "~0").replace('/', "~1")))
            .collect()
    }

    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(&segment.as_key()),
            Value::Array(items) => items.get(segment.as_index()?),
            _ => None,
        })
    }

    /// Set `new_value` at this path, creating intermediate containers.
    ///
    /// Index segments create arrays (padded with `null`), key segments create
    /// objects. A scalar in the way is replaced.
    pub fn set(&self, target: &mut Value, new_value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            *target = new_value;
            return;
        };

        let mut current = target;
        for (i, segment) in parents.iter().enumerate() {
            let next_is_index = matches!(self.0[i + 1], Segment::Index(_));
            current = Self::slot(current, segment, || {
                if next_is_index {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                }
            });
        }
        *Self::slot(current, last, || Value::Null) = new_value;
    }

    /// Borrow (creating if needed) the child slot for `segment`.
    ///
    /// An index more than [`MAX_INDEX_GAP`] past the end of the array is
    /// treated as an object key.
    fn slot<'a>(
        current: &'a mut Value,
        segment: &Segment,
        empty: impl FnOnce() -> Value,
    ) -> &'a mut Value {
        let index = match &*current {
            Value::Array(items) => segment.as_index().filter(|i| fits(*i, items.len())),
            Value::Object(_) => None,
            _ => match segment {
                Segment::Index(i) if fits(*i, 0) => Some(*i),
                _ => None,
            },
        };

        match index {
            Some(_) if !current.is_array() => *current = Value::Array(Vec::new()),
            None if !current.is_object() => *current = Value::Object(Map::new()),
            _ => {}
        }

        let slot = match current {
            Value::Array(items) => {
                let index = index.unwrap_or_default();
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            Value::Object(map) => map.entry(segment.as_key()).or_insert(Value::Null),
            other => other,
        };
        if slot.is_null() {
            *slot = empty();
        }
        slot
    }

    /// Collect `(path, leaf)` pairs for every scalar or empty container.
    pub fn leaves(value: &Value) -> Vec<(ConfigPath, &Value)> {
        let mut out = Vec::new();
        collect_leaves(value, ConfigPath::root(), &mut out);
        out
    }
}

fn collect_leaves<'a>(value: &'a Value, path: ConfigPath, out: &mut Vec<(ConfigPath, &'a Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, path.child(key.as_str()), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                collect_leaves(child, path.child(i), out);
            }
        }
        _ => out.push((path, value)),
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for ConfigPath {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for ConfigPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_pointer())
    }
}

impl<'de> Deserialize<'de> for ConfigPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ConfigPath::from_pointer(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid pointer '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_and_pointer_rendering() {
        let path = ConfigPath::from_iter([Segment::from("users"), 0.into(), "a/b".into()]);
        assert_eq!(path.to_string(), "users.0.a/b");
        assert_eq!(path.to_pointer(), "/users/0/a~1b");
        assert_eq!(ConfigPath::from_pointer("/users/0/a~1b"), Some(path));
    }

    #[test]
    fn test_get_through_arrays() {
        let value = json!({"users": [{"name": "a"}, {"name": "b"}]});
        let path = ConfigPath::from_dotted("users.1.name");
        assert_eq!(path.get(&value), Some(&json!("b")));
        assert_eq!(ConfigPath::from_dotted("users.5").get(&value), None);
    }

    #[test]
    fn test_set_creates_padded_arrays() {
        let mut value = json!({});
        ConfigPath::from_dotted("users.2.name").set(&mut value, json!("c"));
        assert_eq!(value, json!({"users": [null, null, {"name": "c"}]}));

        ConfigPath::from_dotted("users.0.name").set(&mut value, json!("a"));
        assert_eq!(value, json!({"users": [{"name": "a"}, null, {"name": "c"}]}));
    }

    #[test]
    fn test_set_far_index_becomes_key() {
        let mut value = json!({});
        ConfigPath::from_dotted("build.20240101123456").set(&mut value, json!("x"));
        assert_eq!(value, json!({"build": {"20240101123456": "x"}}));

        let path = ConfigPath::from_iter([Segment::from("users"), usize::MAX.into(), "name".into()]);
        path.set(&mut value, json!("y"));
        assert_eq!(value["users"][usize::MAX.to_string()]["name"], json!("y"));

        let mut value = json!({"users": [1, 2]});
        ConfigPath::from_dotted("users.3").set(&mut value, json!(4));
        assert_eq!(value, json!({"users": [1, 2, null, 4]}));
    }

    #[test]
    fn test_set_on_existing_object_keeps_siblings() {
        let mut value = json!({"b": {"c": 2, "d": 4}});
        ConfigPath::from_dotted("b.c").set(&mut value, json!(3));
        assert_eq!(value, json!({"b": {"c": 3, "d": 4}}));
    }

    #[test]
    fn test_prefixes_root_to_leaf() {
        let path = ConfigPath::from_dotted("a.b.c");
        let prefixes: Vec<String> = path.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["a", "a.b", "a.b.c"]);
    }

    #[test]
    fn test_leaves() {
        let value = json!({"a": 1, "b": {"c": [true, {}]}});
        let leaves: Vec<(String, Value)> = ConfigPath::leaves(&value)
            .into_iter()
            .map(|(p, v)| (p.to_string(), v.clone()))
            .collect();
        assert_eq!(
            leaves,
            vec![
                ("a".to_string(), json!(1)),
                ("b.c.0".to_string(), json!(true)),
                ("b.c.1".to_string(), json!({})),
            ]
        );
    }
}
