//! File watching for `file://` sources.
//!
//! Each watched file gets its own debounced watcher on the parent directory
//! (editors often replace files instead of writing in place). Events for the
//! file are forwarded as [`SourceEvent`]s until the cancellation token fires,
//! which drops the debouncer and closes the event channel.

use super::{SourceEvent, SourceEvents};
use crate::error::Error;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for file watching.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Start watching `path`; the returned channel closes once `cancel` fires.
pub fn watch_file(
    path: &Path,
    config: &WatcherConfig,
    cancel: CancellationToken,
) -> Result<SourceEvents, notify::Error> {
    let (tx, rx) = mpsc::unbounded_channel();
    let target = path.to_path_buf();
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let handler_target = target.clone();
    let mut debouncer = new_debouncer(config.debounce_duration, move |result: DebounceEventResult| {
        for event in classify(result, &handler_target) {
            if tx.send(event).is_err() {
                // Receiver dropped
                return;
            }
        }
    })?;

    debouncer
        .watcher()
        .watch(&dir, notify::RecursiveMode::NonRecursive)?;
    info!("Watching file: {}", target.display());

    tokio::spawn(async move {
        // Keep the debouncer alive until cancelled
        let _debouncer = debouncer;
        cancel.cancelled().await;
        info!("Stopped watching file: {}", target.display());
    });

    Ok(rx)
}

/// Turn one debounced batch into at most one stale event plus any errors.
fn classify(result: DebounceEventResult, target: &Path) -> Vec<SourceEvent> {
    match result {
        Ok(events) => {
            let touched = events.iter().any(|event| {
                matches!(
                    event.kind,
                    DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                ) && same_file(&event.path, target)
            });
            if touched {
                debug!("File change detected: {}", target.display());
                vec![SourceEvent::Stale]
            } else {
                Vec::new()
            }
        }
        Err(e) => {
            warn!("File watcher error on {}: {}", target.display(), e);
            vec![SourceEvent::Error(Error::read(
                &target.display().to_string(),
                e,
            ))]
        }
    }
}

fn same_file(event_path: &Path, target: &Path) -> bool {
    event_path == target || event_path.file_name() == target.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_mini::DebouncedEvent;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind: DebouncedEventKind::Any,
        }
    }

    #[test]
    fn test_classify_target_change() {
        let target = PathBuf::from("/etc/app/config.yaml");
        let events = classify(
            Ok(vec![event("/etc/app/other.yaml"), event("/etc/app/config.yaml")]),
            &target,
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SourceEvent::Stale));
    }

    #[test]
    fn test_classify_ignores_siblings() {
        let target = PathBuf::from("/etc/app/config.yaml");
        assert!(classify(Ok(vec![event("/etc/app/other.yaml")]), &target).is_empty());
    }

    #[test]
    fn test_default_debounce() {
        assert_eq!(
            WatcherConfig::default().debounce_duration,
            Duration::from_millis(500)
        );
    }
}
