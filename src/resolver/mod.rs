//! URI resolution with memoization, fragments and cycle detection.
//!
//! [`Resolver::resolve`] maps a URI (absolute, relative or fragment-only) to a
//! [`Reference`], reads and parses it once per `(uri, opts)`, resolves the
//! tokens it contains and applies the fragment. Every decision is traced at
//! `DEBUG` on the `refconf::trace` target.

mod reference;

pub use reference::Reference;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::parsers::ParserRegistry;
use crate::path::ConfigPath;
use crate::query;
use crate::readers::file::data_uri;
use crate::readers::{Content, ReaderRegistry, SourceEvent, SourceEvents, resolve_from_cwd};
use crate::token::ReferenceHost;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use reference::ReferenceParts;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const TRACE: &str = "refconf::trace";
const EVENT_CAPACITY: usize = 64;

/// Notification forwarded from watched sources.
#[derive(Debug, Clone)]
pub enum ResolverEvent {
    Stale { uri: String },
    Error(Error),
}

type RefKey = (String, String);

struct Inner {
    readers: ReaderRegistry,
    parsers: ParserRegistry,
    watch: bool,
    cancel: CancellationToken,
    references: Mutex<HashMap<RefKey, Arc<Reference>>>,
    events: broadcast::Sender<ResolverEvent>,
    next_uid: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

impl Resolver {
    pub fn new(readers: ReaderRegistry, parsers: ParserRegistry, watch: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                readers,
                parsers,
                watch,
                cancel: CancellationToken::new(),
                references: Mutex::new(HashMap::new()),
                events,
                next_uid: AtomicU64::new(1),
            }),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watch
    }

    /// Receive `stale` and `error` events from watched sources.
    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.inner.events.subscribe()
    }

    /// Number of cached document references.
    pub fn len(&self) -> usize {
        self.inner.references.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token cancelled by [`Resolver::clear`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn is_cleared(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Cancel every reference (pending reads and watches) and drop the cache.
    ///
    /// A cleared resolver fails further resolutions with [`Error::Cancelled`].
    pub fn clear(&self) {
        self.inner.cancel.cancel();
        let dropped = {
            let mut references = self.inner.references.lock();
            let count = references.len();
            references.clear();
            count
        };
        debug!(target: TRACE, dropped, "resolver cleared");
    }

    /// Resolve `uri` to plain data.
    ///
    /// The reference lookup happens before this returns; the returned future
    /// waits for the (shared) data and applies the fragment.
    pub fn resolve(
        &self,
        uri: &str,
        opts: ResolveOpts,
        parent: Option<&Arc<Reference>>,
    ) -> BoxFuture<'static, Result<Value>> {
        let (reference, fragment) = match self.prepare(uri, opts, parent) {
            Ok(target) => target,
            Err(err) => {
                debug!(target: TRACE, uri, error = %err, "resolve rejected");
                return future::ready(Err(err)).boxed();
            }
        };

        let resolver = self.clone();
        async move {
            let data = reference.data().await?;
            match fragment.as_deref() {
                None | Some("") => Ok(Value::clone(&data)),
                Some(fragment) => resolver.apply_fragment(&reference, &data, fragment).await,
            }
        }
        .boxed()
    }

    /// Synchronous part of [`Resolver::resolve`]: absolutise, check cycles,
    /// find or create the reference.
    fn prepare(
        &self,
        uri: &str,
        opts: ResolveOpts,
        parent: Option<&Arc<Reference>>,
    ) -> Result<(Arc<Reference>, Option<String>)> {
        let (base, fragment) = split_fragment(uri);
        let base = base.as_str();
        debug!(target: TRACE, uri, base, fragment = ?fragment, "split fragment");

        if base.is_empty() {
            let Some(parent) = parent else {
                return Err(Error::invalid_uri(uri, "fragment-only reference without referrer"));
            };
            let view = self.view(parent, fragment.unwrap_or_default())?;
            return Ok((view, None));
        }

        let absolute = match parent {
            _ if has_scheme(base) => base.to_string(),
            Some(parent) => {
                let document = parent.document();
                let absolute = document.reader().resolve_uri(base, document.uri())?;
                debug!(target: TRACE, relative = base, parent = document.uri(), absolute = %absolute, "absolutised");
                absolute
            }
            None => {
                let absolute = resolve_from_cwd(base)?;
                debug!(target: TRACE, relative = base, absolute = %absolute, "absolutised against working directory");
                absolute
            }
        };

        let opts = self.normalize_watch(opts, parent);
        if let Some(parent) = parent {
            check_cycle(&absolute, parent)?;
        }

        let key = (absolute.clone(), opts.cache_key());
        let mut references = self.inner.references.lock();

        if let Some(existing) = references.get(&key).cloned() {
            if let Some(parent) = parent
                && Arc::ptr_eq(&existing, parent.document())
            {
                drop(references);
                debug!(target: TRACE, uri = %absolute, "cache hit on referrer, selecting own fragment");
                let view = self.view(parent, fragment.unwrap_or_default())?;
                return Ok((view, None));
            }
            debug!(target: TRACE, uri = %absolute, uid = existing.uid(), "cache hit");
            return Ok((existing, fragment));
        }

        let reader = self
            .inner
            .readers
            .find(&absolute)
            .ok_or_else(|| Error::NoReader {
                uri: absolute.clone(),
            })?;
        debug!(target: TRACE, uri = %absolute, reader = reader.name(), "cache miss, reader selected");

        let parts = ReferenceParts {
            uid: self.next_uid(),
            uri: absolute,
            fragment: None,
            opts,
            reader,
            cancel: self.inner.cancel.child_token(),
            parent: parent.cloned(),
        };
        let resolver = self.downgrade();
        let reference = Reference::new_cyclic(parts, move |weak| load_document(resolver, weak).boxed());
        references.insert(key, Arc::clone(&reference));
        Ok((reference, fragment))
    }

    /// Watch flag as it takes part in the cache key: inherited from the
    /// parent when unset, always off when the resolver does not watch.
    fn normalize_watch(&self, mut opts: ResolveOpts, parent: Option<&Arc<Reference>>) -> ResolveOpts {
        let requested = opts.watch;
        let watch = self.inner.watch
            && requested
                .or_else(|| parent.map(|p| p.opts().is_watching()))
                .unwrap_or(true);
        if requested.is_none() && parent.is_some() {
            debug!(target: TRACE, watch, "watch inherited from referrer");
        }
        opts.watch = Some(watch);
        opts
    }

    /// A reference to part of the referrer's own document.
    fn view(&self, parent: &Arc<Reference>, fragment: String) -> Result<Arc<Reference>> {
        let document = parent.document();
        let repeated = std::iter::once(parent)
            .chain(parent.ancestors())
            .take_while(|r| r.is_view())
            .any(|r| r.fragment() == Some(fragment.as_str()));
        if fragment.is_empty() || repeated {
            return Err(Error::CircularReference {
                uri: format!("{}#{}", document.uri(), fragment),
                referrer: parent.display_uri(),
            });
        }

        debug!(target: TRACE, uri = document.uri(), fragment = %fragment, "self fragment lookup");
        let parts = ReferenceParts {
            uid: self.next_uid(),
            uri: document.uri().to_string(),
            fragment: Some(fragment),
            opts: document.opts().clone(),
            reader: Arc::clone(document.reader()),
            cancel: document.cancel_token().clone(),
            parent: Some(Arc::clone(parent)),
        };
        let resolver = self.downgrade();
        Ok(Reference::new_cyclic(parts, move |weak| load_view(resolver, weak).boxed()))
    }

    fn next_uid(&self) -> u64 {
        self.inner.next_uid.fetch_add(1, Ordering::Relaxed)
    }

    fn downgrade(&self) -> WeakResolver {
        WeakResolver(Arc::downgrade(&self.inner))
    }

    /// Read, parse and resolve a document reference.
    async fn read_document(&self, reference: &Arc<Reference>) -> Result<Value> {
        let uri = reference.uri();
        let cancel = reference.cancel_token().clone();

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled(uri)),
            result = reference.reader().read(uri, reference.opts(), cancel.clone()) => result?,
        };

        if let Some(events) = read.events {
            self.forward(uri.to_string(), events, cancel.clone());
        }

        let content_type = reference.opts().content_type.clone().or(read.content_type);
        let node = match content_type {
            Some(content_type) => {
                let parser = self.inner.parsers.find(&content_type).ok_or_else(|| Error::NoParser {
                    content_type: content_type.clone(),
                    uri: uri.to_string(),
                })?;
                debug!(target: TRACE, uri, content_type = %content_type, parser = parser.name(), "parser selected");
                parser.parse(read.content, reference.opts(), &content_type)?
            }
            None => {
                debug!(target: TRACE, uri, "no content type, content passed through");
                unparsed(read.content)
            }
        };

        let node = reference.set_parsed(node);
        self.resolve_node(&node, reference).await
    }

    /// Select a fragment of the document's parsed content and resolve it.
    async fn read_view(&self, view: &Arc<Reference>) -> Result<Value> {
        let document = view.document();
        let parsed = match document.parsed() {
            Some(parsed) => parsed,
            None => {
                document.data().await?;
                document
                    .parsed()
                    .ok_or_else(|| Error::cancelled(document.uri()))?
            }
        };
        let fragment = view.fragment().unwrap_or_default();

        let selected = match classify(fragment, |key| parsed.get(key).is_some()) {
            FragmentKind::Pointer(path) => parsed.pointer(&path),
            FragmentKind::Key => parsed.get(fragment),
            FragmentKind::Query => {
                let host = ReferenceHost {
                    resolver: self.clone(),
                    reference: Arc::clone(view),
                };
                let input = parsed.to_value_lossy();
                return query::evaluate_optional(fragment, &input, &host)
                    .await?
                    .ok_or_else(|| Error::fragment_not_found(fragment, document.uri()));
            }
        };

        match selected {
            Some(node) => self.resolve_node(node, view).await,
            None => Err(Error::fragment_not_found(fragment, document.uri())),
        }
    }

    /// Replace every token in `node` with its resolved value.
    ///
    /// Tokens resolve concurrently; the node itself is left untouched.
    async fn resolve_node(&self, node: &Node, reference: &Arc<Reference>) -> Result<Value> {
        if let Node::Token(token) = node {
            return token.resolve(self, reference).await;
        }

        let (mut value, tokens) = node.split();
        if tokens.is_empty() {
            return Ok(value);
        }

        let resolved = future::try_join_all(
            tokens
                .iter()
                .map(|(_, token)| token.resolve(self, reference)),
        )
        .await?;

        for ((path, _), result) in tokens.into_iter().zip(resolved) {
            path.set(&mut value, result);
        }
        Ok(value)
    }

    async fn apply_fragment(
        &self,
        reference: &Arc<Reference>,
        data: &Value,
        fragment: &str,
    ) -> Result<Value> {
        let selected = match classify(fragment, |key| data.get(key).is_some()) {
            FragmentKind::Pointer(path) => path.get(data).cloned(),
            FragmentKind::Key => data.get(fragment).cloned(),
            FragmentKind::Query => {
                let host = ReferenceHost {
                    resolver: self.clone(),
                    reference: Arc::clone(reference),
                };
                query::evaluate_optional(fragment, data, &host).await?
            }
        };
        debug!(target: TRACE, uri = reference.uri(), fragment, found = selected.is_some(), "fragment applied");
        selected.ok_or_else(|| Error::fragment_not_found(fragment, reference.uri()))
    }

    fn forward(&self, uri: String, mut events: SourceEvents, cancel: CancellationToken) {
        let sender = self.inner.events.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(SourceEvent::Stale) => {
                        debug!(target: TRACE, uri = %uri, "source stale");
                        let _ = sender.send(ResolverEvent::Stale { uri: uri.clone() });
                    }
                    Some(SourceEvent::Error(err)) => {
                        warn!("Watching {} failed: {}", uri, err);
                        let _ = sender.send(ResolverEvent::Error(err));
                    }
                    None => break,
                }
            }
        });
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("watch", &self.inner.watch)
            .field("references", &self.len())
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

struct WeakResolver(Weak<Inner>);

impl WeakResolver {
    fn upgrade(&self) -> Option<Resolver> {
        self.0.upgrade().map(|inner| Resolver { inner })
    }
}

async fn load_document(resolver: WeakResolver, reference: Weak<Reference>) -> Result<Arc<Value>> {
    let (resolver, reference) = upgrade(resolver, reference)?;
    resolver.read_document(&reference).await.map(Arc::new)
}

async fn load_view(resolver: WeakResolver, reference: Weak<Reference>) -> Result<Arc<Value>> {
    let (resolver, reference) = upgrade(resolver, reference)?;
    resolver.read_view(&reference).await.map(Arc::new)
}

fn upgrade(resolver: WeakResolver, reference: Weak<Reference>) -> Result<(Resolver, Arc<Reference>)> {
    let reference = reference
        .upgrade()
        .ok_or_else(|| Error::cancelled("<dropped reference>"))?;
    let resolver = resolver
        .upgrade()
        .ok_or_else(|| Error::cancelled(reference.uri()))?;
    Ok((resolver, reference))
}

/// Split at the first `#` not escaped as `\#`. Escaped hashes stay in the
/// base as `%23`; the fragment is percent-decoded.
fn split_fragment(uri: &str) -> (String, Option<String>) {
    let mut base = String::with_capacity(uri.len());
    let mut chars = uri.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if uri[i + 1..].starts_with('#') => {
                base.push_str("%23");
                chars.next();
            }
            '#' => {
                let raw = &uri[i + 1..];
                let fragment = urlencoding::decode(raw)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                return (base, Some(fragment));
            }
            other => base.push(other),
        }
    }
    (base, None)
}

/// Reject `uri` when it already appears among the referrer's ancestors.
fn check_cycle(uri: &str, parent: &Arc<Reference>) -> Result<()> {
    let document = parent.document();
    if document.ancestors().any(|ancestor| ancestor.uri() == uri) {
        return Err(Error::CircularReference {
            uri: uri.to_string(),
            referrer: parent.display_uri(),
        });
    }
    Ok(())
}

enum FragmentKind {
    Pointer(ConfigPath),
    Key,
    Query,
}

/// `/...` is a pointer, an exact top-level key selects that key, anything
/// else is a query.
fn classify(fragment: &str, has_key: impl Fn(&str) -> bool) -> FragmentKind {
    if fragment.starts_with('/')
        && let Some(path) = ConfigPath::from_pointer(fragment)
    {
        return FragmentKind::Pointer(path);
    }
    if has_key(fragment) {
        return FragmentKind::Key;
    }
    FragmentKind::Query
}

fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once(':') else {
        return false;
    };
    // Single letters are drive names, not schemes
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn unparsed(content: Content) -> Node {
    match content {
        Content::Text(text) => Node::String(text),
        Content::Bytes(bytes) => Node::String(data_uri("application/octet-stream", &bytes)),
        Content::Structured(node) => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::readers::{ArgReader, EnvReader, ReadResult, Reader};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Serves JSON documents from memory and counts reads.
    struct MemoryReader {
        docs: HashMap<String, String>,
        reads: AtomicUsize,
    }

    impl MemoryReader {
        fn new(docs: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                docs: docs
                    .iter()
                    .map(|(k, v)| (format!("mem://host/{}", k), v.to_string()))
                    .collect(),
                reads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Reader for MemoryReader {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn can_read(&self, uri: &str) -> bool {
            uri.starts_with("mem://")
        }

        async fn read(
            &self,
            uri: &str,
            _opts: &ResolveOpts,
            _cancel: CancellationToken,
        ) -> Result<ReadResult> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let text = self
                .docs
                .get(uri)
                .ok_or_else(|| Error::read(uri, "not found"))?;
            Ok(ReadResult::new(
                Some("application/json".to_string()),
                Content::Text(text.clone()),
            ))
        }
    }

    fn resolver(reader: &Arc<MemoryReader>) -> Resolver {
        let mut readers = ReaderRegistry::new();
        readers.push_arc(reader.clone());
        Resolver::new(readers, ParserRegistry::with_defaults(), false)
    }

    async fn resolve(resolver: &Resolver, uri: &str) -> Result<Value> {
        resolver.resolve(uri, ResolveOpts::default(), None).await
    }

    #[tokio::test]
    async fn test_nested_refs_and_fragments() {
        let reader = MemoryReader::new(&[
            (
                "a.json",
                r##"{"db": {"$ref": "./db.json#/primary"}, "name": {"$ref": "#service"}, "service": "api"}"##,
            ),
            ("db.json", r#"{"primary": {"host": "db1", "port": 5432}}"#),
        ]);
        let resolver = resolver(&reader);

        let value = resolve(&resolver, "mem://host/a.json").await.unwrap();
        assert_eq!(
            value,
            json!({"db": {"host": "db1", "port": 5432}, "name": "api", "service": "api"})
        );
        assert_eq!(
            resolve(&resolver, "mem://host/db.json#primary.port").await.unwrap(),
            json!(5432)
        );
    }

    #[tokio::test]
    async fn test_concurrent_resolves_read_once() {
        let reader = MemoryReader::new(&[("a.json", r#"{"x": 1}"#)]);
        let resolver = resolver(&reader);

        let futures = (0..5).map(|_| resolve(&resolver, "mem://host/a.json"));
        let results = future::try_join_all(futures).await.unwrap();
        assert!(results.iter().all(|v| *v == json!({"x": 1})));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_diamond_reads_shared_source_once() {
        let reader = MemoryReader::new(&[
            ("a.json", r#"{"b": {"$ref": "./b.json"}, "c": {"$ref": "./c.json"}}"#),
            ("b.json", r#"{"d": {"$ref": "./d.json"}}"#),
            ("c.json", r#"{"d": {"$ref": "./d.json"}}"#),
            ("d.json", r#"{"leaf": true}"#),
        ]);
        let resolver = resolver(&reader);

        let value = resolve(&resolver, "mem://host/a.json").await.unwrap();
        assert_eq!(value["b"]["d"], json!({"leaf": true}));
        assert_eq!(value["c"]["d"], json!({"leaf": true}));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cycles_are_rejected() {
        let reader = MemoryReader::new(&[
            ("a.json", r#"{"b": {"$ref": "./b.json"}}"#),
            ("b.json", r#"{"a": {"$ref": "./a.json"}}"#),
            ("x.json", r#"{"y": {"$ref": "./y.json"}}"#),
            ("y.json", r#"{"z": {"$ref": "./z.json"}}"#),
            ("z.json", r#"{"x": {"$ref": "./x.json"}}"#),
        ]);
        let resolver = resolver(&reader);

        let err = resolve(&resolver, "mem://host/a.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularReference);

        let err = resolve(&resolver, "mem://host/x.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularReference);
    }

    #[tokio::test]
    async fn test_self_fragment_cycle_is_rejected() {
        let reader = MemoryReader::new(&[(
            "a.json",
            r##"{"p": {"$ref": "#q"}, "q": {"$ref": "#p"}}"##,
        )]);
        let resolver = resolver(&reader);
        let err = resolve(&resolver, "mem://host/a.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CircularReference);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let reader = MemoryReader::new(&[("a.json", r#"{"x": 1}"#)]);
        let resolver = resolver(&reader);

        let err = resolve(&resolver, "ftp://host/a.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoReader);

        let err = resolve(&resolver, "#x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidUri);

        let err = resolve(&resolver, "mem://host/a.json#/missing").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FragmentNotFound);

        let err = resolve(&resolver, "mem://host/nope.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReadFailed);
    }

    #[tokio::test]
    async fn test_query_tokens_and_ref_function() {
        let reader = MemoryReader::new(&[
            (
                "a.json",
                r#"{"url": {"$query": "'http://' & $ref('./hosts.json#primary') & ':' & $string($ref('./hosts.json#/port'))"}}"#,
            ),
            ("hosts.json", r#"{"primary": "db1", "port": 5432}"#),
        ]);
        let resolver = resolver(&reader);

        let value = resolve(&resolver, "mem://host/a.json").await.unwrap();
        assert_eq!(value, json!({"url": "http://db1:5432"}));
    }

    #[tokio::test]
    async fn test_env_and_argv_sources() {
        let mut readers = ReaderRegistry::new();
        readers.push(EnvReader::from_vars([("APP_PORT", "8080"), ("OTHER", "x")]));
        readers.push(ArgReader::from_args(["--user-name", "ada"]));
        let resolver = Resolver::new(readers, ParserRegistry::with_defaults(), false);

        let env = resolver
            .resolve("env:", ResolveOpts::new().with("prefix", json!("app")), None)
            .await
            .unwrap();
        assert_eq!(env, json!({"PORT": "8080"}));

        let name = resolve(&resolver, "arg:#user-name").await.unwrap();
        assert_eq!(name, json!("ada"));
    }

    #[tokio::test]
    async fn test_clear_cancels_future_resolutions() {
        let reader = MemoryReader::new(&[("a.json", r#"{"x": 1}"#)]);
        let resolver = resolver(&reader);
        resolve(&resolver, "mem://host/a.json").await.unwrap();

        resolver.clear();
        assert!(resolver.is_empty());
        let err = resolve(&resolver, "mem://host/a.json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Cancelled);
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("mem://host/a.json"), ("mem://host/a.json".to_string(), None));
        assert_eq!(
            split_fragment("mem://host/a.json#x%23y#z"),
            ("mem://host/a.json".to_string(), Some("x#y#z".to_string()))
        );
        assert_eq!(
            split_fragment("mem://host/a\\#b.json#/c"),
            ("mem://host/a%23b.json".to_string(), Some("/c".to_string()))
        );
        assert_eq!(split_fragment("#a % 2"), (String::new(), Some("a % 2".to_string())));
    }

    #[tokio::test]
    async fn test_encoded_fragment_selects_key() {
        let reader = MemoryReader::new(&[("b.json", r#"{"x#y": 1, "x": {"y": 2}}"#)]);
        let resolver = resolver(&reader);
        assert_eq!(resolve(&resolver, "mem://host/b.json#x%23y").await.unwrap(), json!(1));
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("env:"));
        assert!(has_scheme("https://x/y"));
        assert!(!has_scheme("./a.json"));
        assert!(!has_scheme("C:\\config.json"));
    }
}
