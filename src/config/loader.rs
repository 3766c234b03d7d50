//! Load orchestration.
//!
//! A [`ConfigLoader`] runs load passes: environment and arguments are read
//! through a fresh [`Resolver`], mapped onto the schema, layered over the
//! document named by the `config` key and validated. A successful pass swaps
//! the current configuration and reports what changed; a failed one leaves
//! the last good configuration in place.
//!
//! With watching enabled, a stale source schedules another pass. Passes never
//! overlap: calls to [`ConfigLoader::load`] made while one runs collapse into
//! a single follow-up pass.

use super::merge::merge_layers;
use super::schema::{SchemaValidator, Validator, empty};
use super::unflat::unflat;
use crate::change::{ChangeEmitter, ChangeRecord, ListenerId, PathChange};
use crate::error::{Error, Result};
use crate::opts::ResolveOpts;
use crate::parsers::{Parser, ParserRegistry};
use crate::readers::{
    ArgReader, EnvReader, FileReader, HttpReader, Reader, ReaderRegistry, WatcherConfig,
};
use crate::resolver::{Resolver, ResolverEvent};
use arc_swap::ArcSwapOption;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;
const CONFIG_KEY: &str = "config";

/// Lifecycle notifications published by a [`ConfigLoader`].
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    /// A pass started.
    Load,
    /// A pass produced a new configuration.
    Loaded(Arc<Value>),
    /// The new configuration differs from the previous one.
    Change(Arc<ChangeRecord>),
    Error(Error),
    /// A watched source changed; a pass is scheduled.
    Stale { uri: String },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Idle,
    Loading,
    LoadingWithPending,
}

/// Builder for [`ConfigLoader`].
#[derive(Clone)]
pub struct ConfigLoaderOptions {
    schema: Value,
    env_prefix: Option<String>,
    env_delimiter: String,
    argv_delimiter: String,
    watch: bool,
    readers: Vec<Arc<dyn Reader>>,
    parsers: Vec<Arc<dyn Parser>>,
    env_vars: Option<BTreeMap<String, String>>,
    args: Option<Vec<String>>,
    watcher: WatcherConfig,
    validator: Option<Arc<dyn Validator>>,
}

impl Default for ConfigLoaderOptions {
    fn default() -> Self {
        Self {
            schema: empty(),
            env_prefix: None,
            env_delimiter: "_".to_string(),
            argv_delimiter: "-".to_string(),
            watch: false,
            readers: Vec::new(),
            parsers: Vec::new(),
            env_vars: None,
            args: None,
            watcher: WatcherConfig::default(),
            validator: None,
        }
    }
}

impl ConfigLoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON Schema the configuration must satisfy.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Only read environment variables starting with `prefix` (the prefix
    /// and its `_` are stripped).
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn env_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.env_delimiter = delimiter.into();
        self
    }

    pub fn argv_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.argv_delimiter = delimiter.into();
        self
    }

    /// Watch referenced sources and reload when they change.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Add a reader, consulted before the built-in ones.
    pub fn reader(mut self, reader: impl Reader + 'static) -> Self {
        self.readers.push(Arc::new(reader));
        self
    }

    /// Add a parser, consulted before the built-in ones.
    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// Use these variables instead of the process environment.
    pub fn env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Use these arguments instead of the process arguments.
    pub fn args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn watcher(mut self, watcher: WatcherConfig) -> Self {
        self.watcher = watcher;
        self
    }

    /// Replace schema validation.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    fn reader_registry(&self) -> ReaderRegistry {
        let mut registry = ReaderRegistry::new();
        for reader in &self.readers {
            registry.push_arc(Arc::clone(reader));
        }
        match &self.env_vars {
            Some(vars) => registry.push(EnvReader::from_vars(vars.clone())),
            None => registry.push(EnvReader::from_process()),
        }
        match &self.args {
            Some(args) => registry.push(ArgReader::from_args(args.clone())),
            None => registry.push(ArgReader::from_process()),
        }
        registry.push(FileReader::new(self.watcher.clone()));
        registry.push(HttpReader::default());
        registry
    }

    fn parser_registry(&self) -> ParserRegistry {
        let mut registry = ParserRegistry::with_defaults();
        for parser in self.parsers.iter().rev() {
            registry.prepend(Arc::clone(parser));
        }
        registry
    }
}

impl std::fmt::Debug for ConfigLoaderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoaderOptions")
            .field("env_prefix", &self.env_prefix)
            .field("env_delimiter", &self.env_delimiter)
            .field("argv_delimiter", &self.argv_delimiter)
            .field("watch", &self.watch)
            .field("readers", &self.readers.len())
            .field("parsers", &self.parsers.len())
            .finish_non_exhaustive()
    }
}

struct Inner {
    schema: Value,
    env_prefix: Option<String>,
    env_delimiter: String,
    argv_delimiter: String,
    watch: bool,
    readers: ReaderRegistry,
    parsers: ParserRegistry,
    validator: Arc<dyn Validator>,
    config: ArcSwapOption<Value>,
    state: Mutex<LoadState>,
    /// Set between `start` and `stop`.
    running: Mutex<Option<CancellationToken>>,
    /// Resolver that produced the current configuration.
    resolver: Mutex<Option<Resolver>>,
    events: broadcast::Sender<LoaderEvent>,
    emitter: ChangeEmitter,
}

/// Loads, validates and (optionally) live-reloads configuration.
#[derive(Clone)]
pub struct ConfigLoader {
    inner: Arc<Inner>,
}

impl ConfigLoader {
    /// Fails with [`Error::Schema`] if the schema does not compile.
    pub fn new(options: ConfigLoaderOptions) -> Result<Self> {
        let validator = match &options.validator {
            Some(validator) => Arc::clone(validator),
            None => Arc::new(SchemaValidator::new(&options.schema)?),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                readers: options.reader_registry(),
                parsers: options.parser_registry(),
                schema: options.schema,
                env_prefix: options.env_prefix,
                env_delimiter: options.env_delimiter,
                argv_delimiter: options.argv_delimiter,
                watch: options.watch,
                validator,
                config: ArcSwapOption::empty(),
                state: Mutex::new(LoadState::Idle),
                running: Mutex::new(None),
                resolver: Mutex::new(None),
                events,
                emitter: ChangeEmitter::new(),
            }),
        })
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Run the first pass and keep the loader running until `cancel` fires
    /// or [`ConfigLoader::stop`] is called.
    ///
    /// Returns `Ok(None)` without loading when `cancel` is already cancelled.
    /// A failed first pass stops the loader and returns its error.
    pub async fn start(&self, cancel: CancellationToken) -> Result<Option<Arc<Value>>> {
        let token = {
            let mut running = self.inner.running.lock();
            if running.is_some() {
                return Err(Error::AlreadyRunning);
            }
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let token = cancel.child_token();
            *running = Some(token.clone());
            token
        };
        info!(watch = self.inner.watch, "Starting configuration loader");

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            token.cancelled().await;
            if let Some(inner) = weak.upgrade() {
                ConfigLoader::from_inner(inner).stop();
            }
        });

        *self.inner.state.lock() = LoadState::Loading;
        match self.run_passes().await {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                self.stop();
                Err(err)
            }
        }
    }

    /// Request a pass. While one is running, at most one more is queued.
    pub async fn load(&self) {
        if !self.is_running() {
            debug!("Ignoring load request, loader is not running");
            return;
        }
        {
            let mut state = self.inner.state.lock();
            match *state {
                LoadState::Idle => *state = LoadState::Loading,
                LoadState::Loading | LoadState::LoadingWithPending => {
                    debug!("Load in progress, queueing another pass");
                    *state = LoadState::LoadingWithPending;
                    return;
                }
            }
        }
        let _ = self.run_passes().await;
    }

    /// Run passes until no load is pending; returns the first pass's result.
    async fn run_passes(&self) -> Result<Arc<Value>> {
        let first = self.pass().await;
        loop {
            {
                let mut state = self.inner.state.lock();
                if *state != LoadState::LoadingWithPending {
                    *state = LoadState::Idle;
                    break;
                }
                *state = LoadState::Loading;
            }
            let _ = self.pass().await;
        }
        first
    }

    /// Cancel every reference and watch, and stop reacting to changes.
    pub fn stop(&self) {
        let Some(token) = self.inner.running.lock().take() else {
            return;
        };
        token.cancel();
        if let Some(resolver) = self.inner.resolver.lock().take() {
            resolver.clear();
        }
        info!("Configuration loader stopped");
        let _ = self.inner.events.send(LoaderEvent::Stopped);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.lock().is_some()
    }

    /// Last successfully loaded configuration.
    pub fn config(&self) -> Option<Arc<Value>> {
        self.inner.config.load_full()
    }

    /// Deserialize the current configuration.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.config()
            .map(|config| {
                T::deserialize(config.as_ref()).map_err(|e| Error::parse("application/json", e))
            })
            .transpose()
    }

    pub fn on_change(
        &self,
        listener: impl Fn(&ChangeRecord) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.emitter.on_change(listener)
    }

    /// Listen to changes at or below a dotted path such as `db.host`.
    pub fn on_path(
        &self,
        path: &str,
        listener: impl Fn(&PathChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.emitter.on_path(path, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.emitter.unsubscribe(id)
    }

    /// Raw event channel.
    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.inner.events.subscribe()
    }

    /// Event stream that ends after [`LoaderEvent::Stopped`].
    pub fn events(&self) -> BoxStream<'static, LoaderEvent> {
        let receiver = self.subscribe();
        stream::unfold(Some(receiver), |receiver| async move {
            let mut receiver = receiver?;
            loop {
                match receiver.recv().await {
                    Ok(LoaderEvent::Stopped) => return Some((LoaderEvent::Stopped, None)),
                    Ok(event) => return Some((event, Some(receiver))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Loader event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    fn emit(&self, event: LoaderEvent) {
        let _ = self.inner.events.send(event);
    }

    async fn pass(&self) -> Result<Arc<Value>> {
        let Some(token) = self.inner.running.lock().clone() else {
            return Err(Error::cancelled(CONFIG_KEY));
        };

        self.emit(LoaderEvent::Load);
        let resolver = Resolver::new(
            self.inner.readers.clone(),
            self.inner.parsers.clone(),
            self.inner.watch,
        );
        if self.inner.watch {
            self.watch_resolver(&resolver);
        }

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::cancelled(CONFIG_KEY)),
            candidate = self.candidate(&resolver) => candidate,
        };
        let validated = outcome.and_then(|candidate| self.inner.validator.validate(candidate));

        let config = match validated {
            Ok(config) => Arc::new(config),
            Err(err) => {
                resolver.clear();
                if token.is_cancelled() {
                    debug!("Load pass cancelled");
                } else {
                    error!("Configuration load failed: {}", err);
                    self.emit(LoaderEvent::Error(err.clone()));
                }
                return Err(err);
            }
        };

        let previous = {
            let mut current = self.inner.resolver.lock();
            if token.is_cancelled() {
                drop(current);
                resolver.clear();
                return Err(Error::cancelled(CONFIG_KEY));
            }
            if let Some(old) = current.replace(resolver) {
                old.clear();
            }
            self.inner.config.swap(Some(Arc::clone(&config)))
        };
        info!("Configuration loaded");
        self.emit(LoaderEvent::Loaded(Arc::clone(&config)));

        if let Some(previous) = previous
            && let Some(record) = ChangeRecord::between(previous, Arc::clone(&config))
        {
            let record = Arc::new(record);
            info!(operations = record.patch.len(), "Configuration changed");
            self.emit(LoaderEvent::Change(Arc::clone(&record)));
            for err in self.inner.emitter.emit(&record) {
                warn!("{}", err);
                self.emit(LoaderEvent::Error(err));
            }
        }

        Ok(config)
    }

    /// Resolve and layer the sources into an unvalidated candidate.
    async fn candidate(&self, resolver: &Resolver) -> Result<Value> {
        let mut env_opts = ResolveOpts::new();
        if let Some(prefix) = &self.inner.env_prefix {
            env_opts = env_opts.with("prefix", Value::String(prefix.clone()));
        }
        let (env, args) = future::try_join(
            resolver.resolve("env:", env_opts, None),
            resolver.resolve("arg:", ResolveOpts::new(), None),
        )
        .await?;

        let mut env = self.flat_to_nested(&env, &self.inner.env_delimiter);
        let mut args = self.flat_to_nested(&args, &self.inner.argv_delimiter);

        // Arguments name the base document ahead of the environment
        let from_args = take_config_key(&mut args);
        let from_env = take_config_key(&mut env);
        let base = match from_args.or(from_env) {
            Some(config) => self.base_document(resolver, config).await?,
            None => empty(),
        };
        debug!(
            base = base.is_object(),
            "Merging base document, environment and arguments"
        );

        Ok(merge_layers([empty(), base, env, args]))
    }

    fn flat_to_nested(&self, flat: &Value, delimiter: &str) -> Value {
        match flat {
            Value::Object(map) => unflat(map, delimiter, &self.inner.schema),
            _ => empty(),
        }
    }

    async fn base_document(&self, resolver: &Resolver, config: Value) -> Result<Value> {
        match config {
            Value::Null => Ok(empty()),
            Value::String(uri) => resolver.resolve(&uri, ResolveOpts::new(), None).await,
            Value::Object(mut map) => match take_key(&mut map, "uri") {
                Some(Value::String(uri)) => {
                    let opts = match take_key(&mut map, "opts") {
                        Some(opts) => ResolveOpts::from_value(opts)
                            .map_err(|e| Error::InvalidToken(format!("config opts: {}", e)))?,
                        None => ResolveOpts::new(),
                    };
                    resolver.resolve(&uri, opts, None).await
                }
                Some(other) => Err(Error::invalid_uri(
                    &other.to_string(),
                    "config uri must be a string",
                )),
                None => Ok(Value::Object(map)),
            },
            other => Err(Error::invalid_uri(
                &other.to_string(),
                "config must be a uri or an object",
            )),
        }
    }

    /// Forward stale and error events of `resolver` and schedule reloads.
    fn watch_resolver(&self, resolver: &Resolver) {
        let mut events = resolver.subscribe();
        let cancel = resolver.cancel_token();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let loader = ConfigLoader::from_inner(inner);
                match event {
                    Ok(ResolverEvent::Stale { uri }) => {
                        info!("Source {} changed, reloading configuration", uri);
                        loader.emit(LoaderEvent::Stale { uri });
                        tokio::spawn(async move { loader.load().await });
                    }
                    Ok(ResolverEvent::Error(err)) => loader.emit(LoaderEvent::Error(err)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed source events, reloading configuration");
                        tokio::spawn(async move { loader.load().await });
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("running", &self.is_running())
            .field("state", &*self.inner.state.lock())
            .field("watch", &self.inner.watch)
            .finish_non_exhaustive()
    }
}

/// Remove every `config` key (any case) and return the last one found.
fn take_config_key(layer: &mut Value) -> Option<Value> {
    match layer {
        Value::Object(map) => take_key(map, CONFIG_KEY),
        _ => None,
    }
}

fn take_key(map: &mut Map<String, Value>, name: &str) -> Option<Value> {
    let keys: Vec<String> = map
        .keys()
        .filter(|key| key.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    keys.into_iter().filter_map(|key| map.remove(&key)).last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn isolated() -> ConfigLoader {
        let options = ConfigLoaderOptions::new()
            .env_vars(Vec::<(String, String)>::new())
            .args(Vec::<String>::new());
        ConfigLoader::new(options).unwrap()
    }

    #[test]
    fn test_take_config_key_any_case() {
        let mut layer = json!({"CONFIG": {"URI": "file:///etc/app.yaml"}, "port": 1});
        assert_eq!(
            take_config_key(&mut layer),
            Some(json!({"URI": "file:///etc/app.yaml"}))
        );
        assert_eq!(layer, json!({"port": 1}));
        assert_eq!(take_config_key(&mut layer), None);
    }

    #[tokio::test]
    async fn test_inline_config_object_is_the_base() {
        let loader = isolated();
        let resolver = Resolver::new(ReaderRegistry::new(), ParserRegistry::new(), false);
        let base = loader
            .base_document(&resolver, json!({"name": "inline"}))
            .await
            .unwrap();
        assert_eq!(base, json!({"name": "inline"}));

        let err = loader.base_document(&resolver, json!(5)).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidUri);
    }

    #[tokio::test]
    async fn test_load_before_start_is_ignored() {
        let loader = isolated();
        loader.load().await;
        assert!(loader.config().is_none());
        assert!(!loader.is_running());
    }

    #[tokio::test]
    async fn test_start_twice() {
        let loader = isolated();
        let cancel = CancellationToken::new();
        let config = loader.start(cancel.clone()).await.unwrap();
        assert_eq!(config, Some(Arc::new(json!({}))));
        let err = loader.start(cancel.clone()).await.unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::AlreadyRunning);

        loader.stop();
        assert!(!loader.is_running());

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert_eq!(loader.start(cancelled).await.unwrap(), None);
    }
}
