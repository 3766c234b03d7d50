//! The `load` command (also the default): load configuration from the
//! process environment and the arguments given after `--`.

use crate::config::{AcceptAll, ConfigLoaderOptions};
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for loading configuration
#[derive(Args, Debug, Default)]
pub struct LoadArgs {
    /// JSON or YAML schema file; without it the configuration is not validated
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Only read environment variables with this prefix
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Option<String>,

    /// Keep running and print a change record whenever a source changes
    #[arg(short, long)]
    pub watch: bool,

    /// Configuration options (`--config file.yaml --db-host x`)
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

impl LoadArgs {
    pub fn options(&self) -> Result<ConfigLoaderOptions> {
        let mut options = ConfigLoaderOptions::new()
            .watch(self.watch)
            .args(self.args.clone());
        if let Some(prefix) = &self.env_prefix {
            options = options.env_prefix(prefix);
        }
        options = match &self.schema {
            Some(path) => options.schema(read_schema(path)?),
            None => options.validator(Arc::new(AcceptAll)),
        };
        Ok(options)
    }
}

/// Read a schema, as YAML when the extension says so and JSON otherwise.
pub fn read_schema(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let schema = if is_yaml {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse schema {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse schema {}", path.display()))?
    };
    Ok(schema)
}
