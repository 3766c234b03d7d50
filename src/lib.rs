//! Layered configuration with cross-source references.
//!
//! Configuration is assembled from a base document, environment variables
//! and command-line options. Any value may be a reference token
//! (`@ref file://db.yaml#primary`, YAML `!ref`, JSON `{"$ref": ...}`) or a
//! query (`@query db.host & ":" & db.port`), resolved through pluggable
//! [`readers`] and [`parsers`]. The result is validated against a JSON
//! Schema and, with watching enabled, reloaded when a source changes.
//!
//! ```no_run
//! use refconf::{ConfigLoader, ConfigLoaderOptions};
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> refconf::Result<()> {
//! let loader = ConfigLoader::new(
//!     ConfigLoaderOptions::new()
//!         .schema(json!({"type": "object", "properties": {"port": {"type": "integer"}}}))
//!         .env_prefix("APP")
//!         .watch(true),
//! )?;
//! loader.on_path("port", |change| println!("port is now {:?}", change.value));
//! let config = loader.start(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod cli;
pub mod config;
pub mod error;
pub mod node;
pub mod opts;
pub mod parsers;
pub mod path;
pub mod query;
pub mod readers;
pub mod resolver;
pub mod token;

pub use change::{ChangeRecord, PatchKind, PatchOp, PathChange};
pub use config::{ConfigLoader, ConfigLoaderOptions, LoaderEvent, Validator};
pub use error::{Error, ErrorCode, Result};
pub use node::Node;
pub use opts::ResolveOpts;
pub use path::ConfigPath;
pub use resolver::{Reference, Resolver, ResolverEvent};
pub use token::Token;
