//! Parsed documents that may still contain unresolved tokens.

use crate::path::{ConfigPath, Segment};
use crate::token::Token;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Parser output: plain data plus embedded [`Token`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Node>),
    Object(BTreeMap<String, Node>),
    Token(Token),
}

impl Node {
    pub fn is_token(&self) -> bool {
        matches!(self, Node::Token(_))
    }

    pub fn has_tokens(&self) -> bool {
        match self {
            Node::Token(_) => true,
            Node::Array(items) => items.iter().any(Node::has_tokens),
            Node::Object(map) => map.values().any(Node::has_tokens),
            _ => false,
        }
    }

    /// Convert to plain data, replacing tokens with `null` and collecting
    /// each token with the path it was found at.
    pub fn split(&self) -> (Value, Vec<(ConfigPath, Token)>) {
        let mut tokens = Vec::new();
        let value = self.split_into(&ConfigPath::root(), &mut tokens);
        (value, tokens)
    }

    fn split_into(&self, path: &ConfigPath, tokens: &mut Vec<(ConfigPath, Token)>) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.split_into(&path.child(i), tokens))
                    .collect(),
            ),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.split_into(&path.child(k.as_str()), tokens)))
                    .collect(),
            ),
            Node::Token(token) => {
                tokens.push((path.clone(), token.clone()));
                Value::Null
            }
        }
    }

    /// Plain view with every token replaced by `null`.
    pub fn to_value_lossy(&self) -> Value {
        self.split().0
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn pointer(&self, path: &ConfigPath) -> Option<&Node> {
        path.segments()
            .iter()
            .try_fold(self, |current, segment| match (current, segment) {
                (Node::Object(map), Segment::Key(k)) => map.get(k),
                (Node::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
                (Node::Array(items), Segment::Index(i)) => items.get(*i),
                (Node::Array(items), Segment::Key(k)) => items.get(k.parse::<usize>().ok()?),
                _ => None,
            })
    }

    /// Map `f` over every string leaf, letting it turn strings into tokens.
    pub fn try_map_strings<E>(
        self,
        f: &mut impl FnMut(String) -> Result<Node, E>,
    ) -> Result<Node, E> {
        Ok(match self {
            Node::String(s) => f(s)?,
            Node::Array(items) => Node::Array(
                items
                    .into_iter()
                    .map(|item| item.try_map_strings(&mut *f))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Object(map) => Node::Object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, v.try_map_strings(&mut *f)?)))
                    .collect::<Result<_, E>>()?,
            ),
            other => other,
        })
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => Node::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<Token> for Node {
    fn from(token: Token) -> Self {
        Node::Token(token)
    }
}

impl From<Map<String, Value>> for Node {
    fn from(map: Map<String, Value>) -> Self {
        Node::from(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{QueryToken, RefToken};
    use serde_json::json;

    fn sample() -> Node {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Node::from(json!(1)));
        map.insert(
            "b".to_string(),
            Node::Array(vec![
                Node::Null,
                Token::Ref(RefToken::new("env:#HOME").unwrap()).into(),
            ]),
        );
        map.insert(
            "c".to_string(),
            Token::Query(QueryToken::new("1 + 1")).into(),
        );
        Node::Object(map)
    }

    #[test]
    fn test_split_collects_tokens_with_paths() {
        let node = sample();
        let (value, tokens) = node.split();
        assert_eq!(value, json!({"a": 1, "b": [null, null], "c": null}));
        let paths: Vec<String> = tokens.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["b.1", "c"]);
        // Source node untouched
        assert!(node.has_tokens());
    }

    #[test]
    fn test_pointer_lookup() {
        let node = sample();
        let found = node.pointer(&ConfigPath::from_dotted("b.1")).unwrap();
        assert!(found.is_token());
        assert!(node.pointer(&ConfigPath::from_dotted("b.7")).is_none());
    }

    #[test]
    fn test_plain_value_has_no_tokens() {
        assert!(!Node::from(json!({"x": [1, {"y": "z"}]})).has_tokens());
    }
}
