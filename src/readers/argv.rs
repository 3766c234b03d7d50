//! `arg:` reader: command-line arguments.

use super::{Content, ReadResult, Reader};
use crate::error::Result;
use crate::node::Node;
use crate::opts::ResolveOpts;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub const ARGV_CONTENT_TYPE: &str = "application/x.argv";
const SCHEME: &str = "arg:";

/// Hands the argument list to the argv parser as a structured list.
#[derive(Debug, Clone, Default)]
pub struct ArgReader {
    /// Fixed argument list; `None` reads the process arguments.
    args: Option<Vec<String>>,
}

impl ArgReader {
    pub fn from_process() -> Self {
        Self { args: None }
    }

    pub fn from_args<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Self {
            args: Some(args.into_iter().map(Into::into).collect()),
        }
    }

    fn snapshot(&self) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => std::env::args().skip(1).collect(),
        }
    }
}

#[async_trait]
impl Reader for ArgReader {
    fn name(&self) -> &'static str {
        "arg"
    }

    fn can_read(&self, uri: &str) -> bool {
        uri.starts_with(SCHEME)
    }

    async fn read(
        &self,
        _uri: &str,
        _opts: &ResolveOpts,
        _cancel: CancellationToken,
    ) -> Result<ReadResult> {
        let args = Node::Array(self.snapshot().into_iter().map(Node::String).collect());
        Ok(ReadResult::new(
            Some(ARGV_CONTENT_TYPE.to_string()),
            Content::Structured(args),
        ))
    }

    fn resolve_uri(&self, relative: &str, _parent: &str) -> Result<String> {
        super::resolve_from_cwd(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_fixed_args() {
        let reader = ArgReader::from_args(["--user-name=argName", "--verbose"]);
        let result = reader
            .read("arg:", &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap();
        let Content::Structured(node) = result.content else {
            panic!("expected structured argv content");
        };
        assert_eq!(node.to_value_lossy(), json!(["--user-name=argName", "--verbose"]));
        assert_eq!(result.content_type.as_deref(), Some(ARGV_CONTENT_TYPE));
    }
}
