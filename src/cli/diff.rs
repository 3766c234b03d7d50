//! Diff subcommand for refconf CLI
//!
//! Compares two resolved sources and renders the patch between them.

use crate::change::{PatchKind, PatchOp};
use crate::path::ConfigPath;
use clap::{Args, ValueEnum};

/// Arguments for the diff subcommand
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Previous configuration (URI or path)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Next configuration (URI or path)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = PatchFormat::Text, ignore_case = true)]
    pub format: PatchFormat,

    /// Only show changes at or below these dotted paths (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub paths: Option<Vec<String>>,
}

/// How the patch between two sources is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PatchFormat {
    /// One `+`/`-`/`~` line per operation (default)
    #[default]
    Text,
    /// The operations as a JSON array
    Json,
    /// Counts per operation kind
    Summary,
}

impl DiffArgs {
    /// Filter operations if --paths is specified
    pub fn should_include(&self, path: &ConfigPath) -> bool {
        match &self.paths {
            Some(paths) => paths.iter().any(|p| {
                let prefix = ConfigPath::from_dotted(p);
                path.segments().starts_with(prefix.segments())
            }),
            None => true,
        }
    }

    /// Render the operations kept by the path filter.
    pub fn render(&self, ops: &[PatchOp]) -> serde_json::Result<String> {
        let ops: Vec<&PatchOp> = ops.iter().filter(|op| self.should_include(&op.path)).collect();
        match self.format {
            PatchFormat::Json => serde_json::to_string_pretty(&ops),
            PatchFormat::Text if ops.is_empty() => Ok("No changes".to_string()),
            PatchFormat::Text => Ok(ops
                .iter()
                .map(|op| op.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            PatchFormat::Summary => {
                let count = |kind| ops.iter().filter(|op| op.op == kind).count();
                Ok(format!(
                    "{} added, {} removed, {} replaced",
                    count(PatchKind::Add),
                    count(PatchKind::Remove),
                    count(PatchKind::Replace)
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::diff;
    use serde_json::json;

    fn args(format: PatchFormat, paths: Option<Vec<&str>>) -> DiffArgs {
        DiffArgs {
            source: "a.yaml".to_string(),
            target: "b.yaml".to_string(),
            format,
            paths: paths.map(|p| p.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_format_values() {
        assert_eq!(PatchFormat::from_str("summary", false).unwrap(), PatchFormat::Summary);
        assert_eq!(PatchFormat::from_str("JSON", true).unwrap(), PatchFormat::Json);
        assert!(PatchFormat::from_str("yaml", true).is_err());
    }

    #[test]
    fn test_path_filter() {
        let args = args(PatchFormat::Text, Some(vec!["db", "users.0"]));
        assert!(args.should_include(&ConfigPath::from_dotted("db.host")));
        assert!(args.should_include(&ConfigPath::from_dotted("users.0.name")));
        assert!(!args.should_include(&ConfigPath::from_dotted("users.1")));
        assert!(!args.should_include(&ConfigPath::from_dotted("dbx")));
    }

    #[test]
    fn test_render() {
        let ops = diff(
            &json!({"db": {"host": "a"}, "old": 1}),
            &json!({"db": {"host": "b"}, "new": true}),
        );

        assert_eq!(
            args(PatchFormat::Text, None).render(&ops).unwrap(),
            "- old\n~ db.host = \"b\"\n+ new = true"
        );
        assert_eq!(
            args(PatchFormat::Summary, None).render(&ops).unwrap(),
            "1 added, 1 removed, 1 replaced"
        );
        assert_eq!(
            args(PatchFormat::Text, Some(vec!["missing"])).render(&ops).unwrap(),
            "No changes"
        );
    }
}
