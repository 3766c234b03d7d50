//! Source readers.
//!
//! A [`Reader`] fetches raw content for one URI scheme and, when asked to
//! watch, reports staleness through an event channel. The registry picks the
//! first reader whose [`Reader::can_read`] matches.

pub mod argv;
pub mod env;
pub mod file;
pub mod http;
mod watcher;

pub use argv::ArgReader;
pub use env::EnvReader;
pub use file::FileReader;
pub use http::HttpReader;
pub use watcher::WatcherConfig;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Raw content produced by a reader.
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
    /// Already structured (environment maps, argument lists).
    Structured(Node),
}

/// Notification from a watched source.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Stale,
    Error(Error),
}

pub type SourceEvents = mpsc::UnboundedReceiver<SourceEvent>;

#[derive(Debug)]
pub struct ReadResult {
    pub content_type: Option<String>,
    pub content: Content,
    /// Present only when the read was asked to watch and the source can.
    pub events: Option<SourceEvents>,
}

impl ReadResult {
    pub fn new(content_type: Option<String>, content: Content) -> Self {
        Self {
            content_type,
            content,
            events: None,
        }
    }

    pub fn with_events(mut self, events: SourceEvents) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
pub trait Reader: Send + Sync {
    /// Short name used in traces.
    fn name(&self) -> &'static str;

    fn can_read(&self, uri: &str) -> bool;

    /// Read `uri`. Watching stops when `cancel` fires.
    async fn read(&self, uri: &str, opts: &ResolveOpts, cancel: CancellationToken)
    -> Result<ReadResult>;

    /// Absolutise `relative` against the URI of the referring document.
    fn resolve_uri(&self, relative: &str, parent: &str) -> Result<String> {
        let base = Url::parse(parent).map_err(|e| Error::invalid_uri(parent, e.to_string()))?;
        base.join(relative)
            .map(String::from)
            .map_err(|e| Error::invalid_uri(relative, e.to_string()))
    }
}

/// Ordered list of readers; first match wins.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: Vec<Arc<dyn Reader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment, arguments, files and HTTP, reading the real process state.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.push(EnvReader::from_process());
        registry.push(ArgReader::from_process());
        registry.push(FileReader::default());
        registry.push(HttpReader::default());
        registry
    }

    pub fn push(&mut self, reader: impl Reader + 'static) {
        self.readers.push(Arc::new(reader));
    }

    pub fn push_arc(&mut self, reader: Arc<dyn Reader>) {
        self.readers.push(reader);
    }

    /// Put `reader` ahead of the existing ones.
    pub fn prepend(&mut self, reader: Arc<dyn Reader>) {
        self.readers.insert(0, reader);
    }

    pub fn find(&self, uri: &str) -> Option<Arc<dyn Reader>> {
        self.readers.iter().find(|r| r.can_read(uri)).cloned()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

/// Resolve a relative path against the working directory.
///
/// Used by readers whose own URIs cannot serve as a base (`env:`, `arg:`).
pub(crate) fn resolve_from_cwd(relative: &str) -> Result<String> {
    let cwd = std::env::current_dir().map_err(|e| Error::invalid_uri(relative, e.to_string()))?;
    let base = Url::from_directory_path(&cwd)
        .map_err(|_| Error::invalid_uri(relative, "working directory is not absolute"))?;
    base.join(relative)
        .map(String::from)
        .map_err(|e| Error::invalid_uri(relative, e.to_string()))
}

/// Strip parameters from a media type and lowercase it.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolve_uri_joins() {
        let reader = FileReader::default();
        assert_eq!(
            reader
                .resolve_uri("./db.yaml", "file:///etc/app/config.yaml")
                .unwrap(),
            "file:///etc/app/db.yaml"
        );
        assert_eq!(
            HttpReader::default()
                .resolve_uri("../shared.json", "https://cfg.example.com/app/main.json")
                .unwrap(),
            "https://cfg.example.com/shared.json"
        );
    }

    #[test]
    fn test_registry_first_match_wins() {
        let registry = ReaderRegistry::with_defaults();
        assert_eq!(registry.find("env:").map(|r| r.name()), Some("env"));
        assert_eq!(registry.find("arg:#x").map(|r| r.name()), Some("arg"));
        assert_eq!(registry.find("file:///tmp/a.json").map(|r| r.name()), Some("file"));
        assert_eq!(registry.find("https://x/a").map(|r| r.name()), Some("http"));
        assert!(registry.find("ftp://x").is_none());
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("Application/JSON; charset=utf-8"), "application/json");
    }
}
