//! `env:` reader: process environment variables.
//!
//! `env:` yields the whole (optionally prefix-filtered) variable map;
//! `env:NAME` yields a single variable as text.

use super::{Content, ReadResult, Reader};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::opts::ResolveOpts;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

pub const ENV_CONTENT_TYPE: &str = "application/x.env";
const SCHEME: &str = "env:";

#[derive(Debug, Clone, Default)]
pub struct EnvReader {
    /// Fixed snapshot; `None` reads the live process environment.
    vars: Option<BTreeMap<String, String>>,
}

impl EnvReader {
    pub fn from_process() -> Self {
        Self { vars: None }
    }

    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        }
    }
}

/// Keep variables starting with `prefix` (case-insensitive) and strip it.
///
/// A trailing `_` is implied: prefix `APP` matches `APP_LOG_LEVEL`.
pub fn filter_prefix(vars: BTreeMap<String, String>, prefix: &str) -> BTreeMap<String, String> {
    let mut full = prefix.to_ascii_lowercase();
    if !full.ends_with('_') {
        full.push('_');
    }
    vars.into_iter()
        .filter_map(|(key, value)| {
            let lowered = key.to_ascii_lowercase();
            lowered
                .starts_with(&full)
                .then(|| (key[full.len()..].to_string(), value))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

#[async_trait]
impl Reader for EnvReader {
    fn name(&self) -> &'static str {
        "env"
    }

    fn can_read(&self, uri: &str) -> bool {
        uri.starts_with(SCHEME)
    }

    async fn read(
        &self,
        uri: &str,
        opts: &ResolveOpts,
        _cancel: CancellationToken,
    ) -> Result<ReadResult> {
        let mut vars = self.snapshot();
        if let Some(prefix) = opts.get_str("prefix").filter(|p| !p.is_empty()) {
            vars = filter_prefix(vars, prefix);
        }

        let name = &uri[SCHEME.len()..];
        if !name.is_empty() {
            let value = vars.remove(name).ok_or_else(|| Error::Read {
                uri: uri.to_string(),
                message: format!("environment variable {} is not set", name),
            })?;
            return Ok(ReadResult::new(None, Content::Text(value)));
        }

        let node = Node::Object(vars.into_iter().map(|(k, v)| (k, Node::String(v))).collect());
        Ok(ReadResult::new(
            Some(ENV_CONTENT_TYPE.to_string()),
            Content::Structured(node),
        ))
    }

    fn resolve_uri(&self, relative: &str, _parent: &str) -> Result<String> {
        super::resolve_from_cwd(relative)
    }
}
