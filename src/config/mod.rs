//! Configuration loading.
//!
//! Sources are layered with increasing precedence:
//! 1. **Base document** - named by the `config` key of the arguments or the
//!    environment (`--config file.yaml`, `APP_CONFIG=https://...`)
//! 2. **Environment** - `env:` variables, optionally filtered by prefix
//! 3. **Arguments** - `arg:` command-line options
//!
//! ## Flat keys
//! Environment variables and options are mapped onto the schema
//! (`DB_HOST` and `--db-host` both become `db.host`).
//!
//! ## Merge Strategy
//! Each layer is applied leaf by leaf; `null` leaves leave lower layers alone.

mod loader;
mod merge;
mod schema;
mod unflat;

pub use loader::{ConfigLoader, ConfigLoaderOptions, LoaderEvent};
pub use merge::{merge_layers, overlay_leaves};
pub use schema::{AcceptAll, SchemaValidator, Validator};
pub use unflat::{flat_path, unflat};
