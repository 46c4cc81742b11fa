//! Production transport on reqwest.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace, warn};

use zen_core::error::TransportError;
use zen_core::{Body, Method, Request, Response, Result, Transport};

use crate::progress::file_stream;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Map a reqwest failure onto the transport error taxonomy.
pub fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    }
}

fn to_error(err: reqwest::Error) -> zen_core::Error {
    transport_error(err).into()
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransportBuilder {
    user_agent: String,
    connect_timeout: Duration,
    timeout: Option<Duration>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            user_agent: concat!("zen/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: None,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whole-request timeout. Unset by default, as uploads can be large.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(to_error)?;
        Ok(ReqwestTransport { client })
    }
}

/// A [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    async fn prepare(&self, request: Request) -> Result<reqwest::RequestBuilder> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File(file) => {
                let size = tokio::fs::metadata(&file.path).await?.len();
                debug!(path = %file.path.display(), size, "streaming file body");
                let stream = file_stream(file.path, size, file.quiet);
                builder
                    .header(CONTENT_LENGTH, size)
                    .body(reqwest::Body::wrap_stream(stream))
            }
        };

        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: Request) -> Result<Response> {
        let builder = self.prepare(request).await?;
        let response = builder.send().await.map_err(to_error)?;
        let status = response.status().as_u16();
        trace!(status, content_type = ?response.headers().get(CONTENT_TYPE), "response");
        let body = response.bytes().await.map_err(to_error)?;
        Ok(Response::new(status, body.to_vec()))
    }

    #[instrument(skip(self, request), fields(url = %request.url, dest = %dest.display()))]
    async fn download(&self, request: Request, dest: &Path) -> Result<Response> {
        let builder = self.prepare(request).await?;
        let response = builder.send().await.map_err(to_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await.map_err(to_error)?;
            return Ok(Response::new(status.as_u16(), body.to_vec()));
        }

        let body = response.bytes_stream().map(|chunk| chunk.map_err(to_error));
        let written = save_stream(dest, body).await?;
        debug!(bytes = written, "download complete");
        Ok(Response::new(status.as_u16(), Vec::new()))
    }
}

/// Write a body stream to `dest`. On failure the partial file is removed
/// so a truncated download never passes for the real content.
async fn save_stream<S, B>(dest: &Path, body: S) -> Result<u64>
where
    S: Stream<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    let file = tokio::fs::File::create(dest).await?;
    match write_body(file, body).await {
        Ok(written) => Ok(written),
        Err(err) => {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!(error = %e, "could not remove partial download");
            }
            Err(err)
        }
    }
}

async fn write_body<S, B>(mut file: tokio::fs::File, body: S) -> Result<u64>
where
    S: Stream<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    let mut body = std::pin::pin!(body);
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = ReqwestTransport::builder();
        assert!(builder.user_agent.starts_with("zen/"));
        assert_eq!(builder.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(builder.timeout.is_none());
    }

    #[tokio::test]
    async fn interrupted_body_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("data.bin");
        let body = futures_util::stream::iter(vec![
            Ok(b"first half".to_vec()),
            Err(TransportError::Connection {
                message: "reset by peer".into(),
            }
            .into()),
        ]);

        let result = save_stream(&dest, body).await;

        assert!(matches!(result, Err(zen_core::Error::Transport(_))));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn complete_body_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("data.bin");
        let body = futures_util::stream::iter(vec![Ok(b"abc".to_vec()), Ok(b"def".to_vec())]);

        let written = save_stream(&dest, body).await.unwrap();

        assert_eq!(written, 6);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
    }

    #[test]
    fn transport_creation() {
        let transport = ReqwestTransport::builder()
            .user_agent("zen-test")
            .timeout(Duration::from_secs(5))
            .build();
        assert!(transport.is_ok());
    }
}
