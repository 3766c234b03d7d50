//! `file://` reader.

use super::watcher::{WatcherConfig, watch_file};
use super::{Content, ReadResult, Reader};
use crate::error::{Error, Result};
use crate::opts::ResolveOpts;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const SCHEME: &str = "file://";

#[derive(Debug, Clone, Default)]
pub struct FileReader {
    watcher: WatcherConfig,
}

impl FileReader {
    pub fn new(watcher: WatcherConfig) -> Self {
        Self { watcher }
    }
}

/// Convert a `file://` URI to a local path.
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let url = Url::parse(uri).map_err(|e| Error::invalid_uri(uri, e.to_string()))?;
    url.to_file_path()
        .map_err(|_| Error::invalid_uri(uri, "not a local file path"))
}

/// Convert a local path (absolute or relative to the working directory) to a
/// `file://` URI.
pub fn path_to_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::read(&path.display().to_string(), e))?
            .join(path)
    };
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| Error::invalid_uri(&absolute.display().to_string(), "not an absolute path"))
}

/// Content type for text formats, keyed by extension.
fn text_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "json" => "application/json",
        "yml" | "yaml" => "application/yaml",
        "toml" => "application/toml",
        "ini" => "application/x.ini",
        "env" => "application/x.env",
        _ => return None,
    })
}

/// Media type for binary files embedded as data URIs.
fn binary_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "der" | "cer" => "application/pkix-cert",
        "p12" | "pfx" => "application/x-pkcs12",
        _ => return None,
    })
}

pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

#[async_trait]
impl Reader for FileReader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_read(&self, uri: &str) -> bool {
        uri.starts_with(SCHEME)
    }

    async fn read(
        &self,
        uri: &str,
        opts: &ResolveOpts,
        cancel: CancellationToken,
    ) -> Result<ReadResult> {
        let path = uri_to_path(uri)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::read(uri, e))?;
        if metadata.is_dir() {
            return Err(Error::read(uri, "directories are not supported"));
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| Error::read(uri, e))?;

        let mut result = match (binary_media_type(&path), String::from_utf8(bytes)) {
            (None, Ok(text)) => ReadResult::new(
                text_content_type(&path).map(str::to_string),
                Content::Text(text),
            ),
            (media_type, text) => {
                let bytes = match text {
                    Ok(text) => text.into_bytes(),
                    Err(e) => e.into_bytes(),
                };
                let media_type = media_type.unwrap_or("application/octet-stream");
                debug!(uri, media_type, "Embedding binary file as data uri");
                ReadResult::new(None, Content::Text(data_uri(media_type, &bytes)))
            }
        };

        if opts.is_watching() {
            let events = watch_file(&path, &self.watcher, cancel)
                .map_err(|e| Error::read(uri, format!("unable to watch: {}", e)))?;
            result = result.with_events(events);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_text_with_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "a: 1\n").unwrap();

        let uri = path_to_uri(&path).unwrap();
        let result = FileReader::default()
            .read(&uri, &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.content_type.as_deref(), Some("application/yaml"));
        assert!(matches!(result.content, Content::Text(ref s) if s == "a: 1\n"));
        assert!(result.events.is_none());
    }

    #[tokio::test]
    async fn test_binary_file_becomes_data_uri() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        fs::write(&path, [0x89u8, b'P', b'N', b'G']).unwrap();

        let uri = path_to_uri(&path).unwrap();
        let result = FileReader::default()
            .read(&uri, &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap();

        assert!(result.content_type.is_none());
        let Content::Text(text) = result.content else {
            panic!("expected data uri text");
        };
        assert_eq!(text, "data:image/png;base64,iVBORw==");
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let uri = path_to_uri(&dir.path().join("nope.json")).unwrap();
        let err = FileReader::default()
            .read(&uri, &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Unable to read"));
    }

    #[test]
    fn test_uri_path_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a b.json");
        let uri = path_to_uri(&path).unwrap();
        assert!(uri.starts_with("file://"));
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }
}
