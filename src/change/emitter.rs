//! Change listener registry.
//!
//! Tracks global listeners (whole change records) and path-scoped listeners
//! keyed by dotted path (`b`, `b.c`, `users.0.name`). After a reload the
//! loader hands the change record here; global listeners run first, then
//! every path prefix from root to leaf is notified once per reload.

use super::{ChangeRecord, PathChange};
use crate::error::Error;
use crate::path::ConfigPath;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type ChangeListener = Arc<dyn Fn(&ChangeRecord) + Send + Sync>;
pub type PathListener = Arc<dyn Fn(&PathChange) + Send + Sync>;

/// Handle returned by subscriptions, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ChangeEmitter {
    global: Mutex<Vec<(ListenerId, ChangeListener)>>,
    paths: Mutex<HashMap<String, Vec<(ListenerId, PathListener)>>>,
    next_id: AtomicU64,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Listen to every change record.
    pub fn on_change(&self, listener: impl Fn(&ChangeRecord) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id();
        self.global.lock().push((id, Arc::new(listener)));
        id
    }

    /// Listen to changes at or below `path` (dotted form).
    pub fn on_path(
        &self,
        path: &str,
        listener: impl Fn(&PathChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id();
        self.paths
            .lock()
            .entry(path.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        {
            let mut global = self.global.lock();
            if let Some(pos) = global.iter().position(|(lid, _)| *lid == id) {
                global.remove(pos);
                return true;
            }
        }

        let mut paths = self.paths.lock();
        let mut removed = false;
        paths.retain(|_, listeners| {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                removed = true;
            }
            !listeners.is_empty()
        });
        removed
    }

    pub fn has_global_listeners(&self) -> bool {
        !self.global.lock().is_empty()
    }

    pub fn has_path_listener(&self, path: &str) -> bool {
        self.paths.lock().contains_key(path)
    }

    fn path_listeners(&self, path: &str) -> Vec<PathListener> {
        self.paths
            .lock()
            .get(path)
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Deliver `record`.
    ///
    /// Returns one [`Error::UnhandledChange`] per operation that neither a
    /// global listener nor a listener on one of its prefixes received.
    /// Listeners run without any lock held, so they may subscribe or
    /// unsubscribe.
    pub fn emit(&self, record: &ChangeRecord) -> Vec<Error> {
        if record.patch.is_empty() {
            return Vec::new();
        }

        let global: Vec<ChangeListener> = self
            .global
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in &global {
            listener(record);
        }
        let handled_globally = !global.is_empty();

        let mut notified: HashSet<ConfigPath> = HashSet::new();
        let mut unhandled = Vec::new();

        for op in &record.patch {
            let mut has_listener = false;
            for prefix in op.path.prefixes() {
                let listeners = self.path_listeners(&prefix.to_string());
                if listeners.is_empty() {
                    continue;
                }
                has_listener = true;
                if !notified.insert(prefix.clone()) {
                    continue;
                }
                let change = PathChange {
                    value: prefix.get(&record.config).cloned(),
                    previous_value: prefix.get(&record.previous_config).cloned(),
                    path: prefix,
                    config: Arc::clone(&record.config),
                    previous_config: Arc::clone(&record.previous_config),
                };
                debug!(path = %change.path, listeners = listeners.len(), "Notifying path listeners");
                for listener in &listeners {
                    listener(&change);
                }
            }

            if !has_listener && !handled_globally {
                unhandled.push(Error::UnhandledChange {
                    path: op.path.to_string(),
                });
            }
        }

        unhandled
    }
}

impl std::fmt::Debug for ChangeEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEmitter")
            .field("global", &self.global.lock().len())
            .field("paths", &self.paths.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn record(previous: serde_json::Value, next: serde_json::Value) -> ChangeRecord {
        ChangeRecord::between(Arc::new(previous), Arc::new(next)).unwrap()
    }

    #[test]
    fn test_global_then_prefixes_root_to_leaf() {
        let emitter = ChangeEmitter::new();
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let l = log.clone();
        emitter.on_change(move |r| l.lock().push(format!("change {}", r.patch.len())));
        for path in ["b.c", "b"] {
            let l = log.clone();
            emitter.on_path(path, move |c| {
                let show = |v: &Option<serde_json::Value>| v.clone().unwrap_or_default().to_string();
                l.lock().push(format!("{} {}->{}", c.path, show(&c.previous_value), show(&c.value)))
            });
        }

        let errors = emitter.emit(&record(json!({"a": 1, "b": {"c": 2}}), json!({"a": 1, "b": {"c": 3}})));
        assert!(errors.is_empty());
        assert_eq!(
            *log.lock(),
            vec![
                "change 1".to_string(),
                r#"b {"c":2}->{"c":3}"#.to_string(),
                "b.c 2->3".to_string(),
            ]
        );
    }

    #[test]
    fn test_shared_prefix_notified_once() {
        let emitter = ChangeEmitter::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        emitter.on_path("server", move |_| *c.lock() += 1);

        let errors = emitter.emit(
            &record(
                json!({"server": {"host": "a", "port": 1}}),
                json!({"server": {"host": "b", "port": 2}}),
            ),
        );
        assert!(errors.is_empty());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_unhandled_change_without_listeners() {
        let emitter = ChangeEmitter::new();
        emitter.on_path("other", |_| {});

        let errors = emitter.emit(&record(json!({"a": {"b": 1}}), json!({"a": {"b": 2}})));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), ErrorCode::UnhandledChange);
        assert_eq!(errors[0].to_string(), "Unhandled config watch change for a.b");

        emitter.on_change(|_| {});
        assert!(emitter.emit(&record(json!({"a": 1}), json!({"a": 2}))).is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let emitter = ChangeEmitter::new();
        let id = emitter.on_path("a", |_| {});
        let global = emitter.on_change(|_| {});
        assert!(emitter.has_path_listener("a"));

        assert!(emitter.unsubscribe(id));
        assert!(!emitter.has_path_listener("a"));
        assert!(emitter.unsubscribe(global));
        assert!(!emitter.has_global_listeners());
        assert!(!emitter.unsubscribe(id));
    }
}
