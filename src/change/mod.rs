//! Change detection between successive configurations.
//!
//! [`diff`] produces a patch; [`ChangeEmitter`] delivers it to global and
//! path-scoped listeners.

mod diff;
mod emitter;

pub use diff::diff;
pub use emitter::{ChangeEmitter, ChangeListener, ListenerId, PathListener};

use crate::path::ConfigPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Add,
    Remove,
    Replace,
}

/// One patch operation. `value` is absent for removals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: PatchKind,
    pub path: ConfigPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn add(path: ConfigPath, value: Value) -> Self {
        Self {
            op: PatchKind::Add,
            path,
            value: Some(value),
        }
    }

    pub fn remove(path: ConfigPath) -> Self {
        Self {
            op: PatchKind::Remove,
            path,
            value: None,
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.op {
            PatchKind::Add => '+',
            PatchKind::Remove => '-',
            PatchKind::Replace => '~',
        };
        match &self.value {
            Some(value) => write!(f, "{} {} = {}", sign, self.path, value),
            None => write!(f, "{} {}", sign, self.path),
        }
    }
}

/// Result of a reload that changed the configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub patch: Vec<PatchOp>,
    pub config: Arc<Value>,
    pub previous_config: Arc<Value>,
}

impl ChangeRecord {
    /// Diff two snapshots. `None` when nothing changed.
    pub fn between(previous_config: Arc<Value>, config: Arc<Value>) -> Option<Self> {
        let patch = diff(&previous_config, &config);
        if patch.is_empty() {
            return None;
        }
        Some(Self {
            patch,
            config,
            previous_config,
        })
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration changed ({} operations)", self.patch.len())?;
        for op in &self.patch {
            writeln!(f, "  {}", op)?;
        }
        Ok(())
    }
}

/// Notification for one path prefix touched by a reload.
#[derive(Debug, Clone)]
pub struct PathChange {
    pub path: ConfigPath,
    pub value: Option<Value>,
    pub previous_value: Option<Value>,
    pub config: Arc<Value>,
    pub previous_config: Arc<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_serializes_as_json_patch() {
        let record = ChangeRecord::between(
            Arc::new(json!({"users": [{"name": "a"}], "old": 1})),
            Arc::new(json!({"users": [{"name": "b"}]})),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&record.patch).unwrap(),
            json!([
                {"op": "replace", "path": "/users/0/name", "value": "b"},
                {"op": "remove", "path": "/old"}
            ])
        );
    }

    #[test]
    fn test_unchanged_snapshots_produce_no_record() {
        let config = Arc::new(json!({"a": 1}));
        assert!(ChangeRecord::between(config.clone(), config).is_none());
    }

    #[test]
    fn test_display() {
        let record = ChangeRecord::between(Arc::new(json!({"a": 1})), Arc::new(json!({"a": 2})))
            .unwrap();
        assert_eq!(
            record.to_string(),
            "Configuration changed (1 operations)\n  ~ a = 2\n"
        );
    }
}
