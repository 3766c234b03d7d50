//! CLI command definitions for refconf
//!
//! This module defines the CLI structure using clap's derive macros.
//! Without a subcommand the binary runs `load` with default arguments.

pub mod diff;
pub mod load;

use clap::{Args, Parser, Subcommand};
use diff::DiffArgs;
use load::LoadArgs;

/// Resolve, validate and watch layered configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load configuration from the environment and arguments, optionally watching it
    Load(LoadArgs),

    /// Resolve a single source, following its references
    Resolve(ResolveArgs),

    /// Compare two sources and print the patch between them
    Diff(DiffArgs),
}

/// Arguments for the resolve subcommand
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// URI or path of the source, optionally with a #fragment
    #[arg(value_name = "URI")]
    pub uri: String,

    /// Parse the source as this content type instead of the detected one
    #[arg(long, value_name = "TYPE")]
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_args() {
        let cli = Cli::parse_from([
            "refconf", "-v", "load", "--watch", "--env-prefix", "APP", "--", "--port", "80",
        ]);
        assert!(cli.verbose);
        let Some(Command::Load(load)) = cli.command else {
            panic!("expected load");
        };
        assert!(load.watch);
        assert_eq!(load.env_prefix.as_deref(), Some("APP"));
        assert_eq!(load.args, vec!["--port", "80"]);

        let cli = Cli::parse_from(["refconf"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::parse_from(["refconf", "--log", "0", "-v", "resolve", "config.yaml#db"]);
        assert!(cli.verbose);
        assert_eq!(cli.log, "0");
        let Some(Command::Resolve(args)) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.uri, "config.yaml#db");

        let cli = Cli::parse_from(["refconf", "diff", "a.yaml", "b.json", "--format", "json", "-l", "off"]);
        assert_eq!(cli.log, "off");
        assert!(matches!(cli.command, Some(Command::Diff(_))));
    }
}
