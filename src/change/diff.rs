//! Structural diff between two configuration snapshots.

use super::{PatchKind, PatchOp};
use crate::path::ConfigPath;
use serde_json::Value;

/// Ordered add/remove/replace operations turning `previous` into `next`.
///
/// Objects and arrays of the same kind are compared per key or index;
/// anything else that differs is replaced. Existing entries are visited from
/// the end so array removals keep earlier indices valid, then additions
/// follow in order.
pub fn diff(previous: &Value, next: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_into(previous, next, &ConfigPath::root(), &mut ops);
    ops
}

fn diff_into(previous: &Value, next: &Value, path: &ConfigPath, ops: &mut Vec<PatchOp>) {
    if previous == next {
        return;
    }

    match (previous, next) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old.iter().rev() {
                let child = path.child(key.as_str());
                match new.get(key) {
                    Some(new_value) => diff_into(old_value, new_value, &child, ops),
                    None => ops.push(PatchOp::remove(child)),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    ops.push(PatchOp::add(path.child(key.as_str()), new_value.clone()));
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for (index, old_value) in old.iter().enumerate().rev() {
                let child = path.child(index);
                match new.get(index) {
                    Some(new_value) => diff_into(old_value, new_value, &child, ops),
                    None => ops.push(PatchOp::remove(child)),
                }
            }
            for (index, new_value) in new.iter().enumerate().skip(old.len()) {
                ops.push(PatchOp::add(path.child(index), new_value.clone()));
            }
        }
        _ => ops.push(PatchOp {
            op: PatchKind::Replace,
            path: path.clone(),
            value: Some(next.clone()),
        }),
    }
}
