//! `http://` and `https://` reader.
//!
//! Watching polls the URL every `watchInterval` milliseconds (default 60 s)
//! and reports staleness when the body changes.

use super::{Content, ReadResult, Reader, SourceEvent, essence};
use crate::error::{Error, Result};
use crate::opts::ResolveOpts;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct HttpReader {
    client: reqwest::Client,
}

impl HttpReader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

async fn fetch(client: &reqwest::Client, uri: &str) -> Result<(Option<String>, String)> {
    let response = client
        .get(uri)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| Error::read(uri, e))?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence);

    let body = response.text().await.map_err(|e| Error::read(uri, e))?;
    Ok((content_type, body))
}

fn watch_interval(opts: &ResolveOpts) -> Duration {
    opts.get_u64("watchInterval")
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_WATCH_INTERVAL)
}

#[async_trait]
impl Reader for HttpReader {
    fn name(&self) -> &'static str {
        "http"
    }

    fn can_read(&self, uri: &str) -> bool {
        uri.starts_with("http://") || uri.starts_with("https://")
    }

    async fn read(
        &self,
        uri: &str,
        opts: &ResolveOpts,
        cancel: CancellationToken,
    ) -> Result<ReadResult> {
        let (content_type, body) = fetch(&self.client, uri).await?;
        debug!(uri, content_type = ?content_type, "Fetched remote source");

        let mut result = ReadResult::new(content_type, Content::Text(body.clone()));

        if opts.is_watching() {
            let (tx, rx) = mpsc::unbounded_channel();
            let client = self.client.clone();
            let uri = uri.to_string();
            let interval = watch_interval(opts);
            info!("Polling {} every {:?}", uri, interval);

            tokio::spawn(async move {
                let mut last = body;
                let mut ticker = tokio::time::interval(interval);
                // First tick fires immediately
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    let event = match fetch(&client, &uri).await {
                        Ok((_, next)) if next != last => {
                            last = next;
                            Some(SourceEvent::Stale)
                        }
                        Ok(_) => None,
                        Err(e) => {
                            warn!("Polling {} failed: {}", uri, e);
                            Some(SourceEvent::Error(e))
                        }
                    };
                    if let Some(event) = event
                        && tx.send(event).is_err()
                    {
                        break;
                    }
                }
                info!("Stopped polling {}", uri);
            });

            result = result.with_events(rx);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reads_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"a": 1}"#, "application/json; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let uri = format!("{}/config.json", server.uri());
        let result = HttpReader::default()
            .read(&uri, &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.content_type.as_deref(), Some("application/json"));
        assert!(matches!(result.content, Content::Text(ref s) if s == r#"{"a": 1}"#));
    }

    #[tokio::test]
    async fn test_http_error_status_is_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let uri = format!("{}/missing.json", server.uri());
        let err = HttpReader::default()
            .read(&uri, &ResolveOpts::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[tokio::test]
    async fn test_polling_reports_changed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v2"))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let opts = ResolveOpts::new()
            .with_watch(true)
            .with("watchInterval", serde_json::json!(20));
        let uri = format!("{}/poll", server.uri());
        let mut result = HttpReader::default()
            .read(&uri, &opts, cancel.clone())
            .await
            .unwrap();

        let mut events = result.events.take().unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(SourceEvent::Stale)));

        cancel.cancel();
        // Poller exits and drops the sender
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
