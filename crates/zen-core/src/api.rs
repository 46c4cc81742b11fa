//! Authenticated request layer shared by every entity.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::error::{ApiError, Error};
use crate::token::{AccessToken, TokenPlacement};
use crate::transport::{Body, FileBody, Method, Request, Response, Transport};
use crate::types::BaseUrl;
use crate::Result;

/// Connection settings for an [`Api`].
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub base_url: BaseUrl,
    pub token: Option<AccessToken>,
    pub token_placement: TokenPlacement,
    /// Query parameters sent with every request.
    pub params: Vec<(String, String)>,
    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl ApiConfig {
    pub fn new(base_url: BaseUrl) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: AccessToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_token_placement(mut self, placement: TokenPlacement) -> Self {
        self.token_placement = placement;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

struct ApiInner {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
}

/// Shared handle to the repository API.
///
/// Cloning is cheap; every draft, record and file derived from an `Api`
/// holds a clone and issues its requests through it.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("base_url", &self.inner.config.base_url)
            .field("token", &self.inner.config.token)
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Create an API handle over the given transport.
    pub fn new(config: ApiConfig, transport: impl Transport + 'static) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create an API handle over an already shared transport.
    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ApiInner { config, transport }),
        }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.config.base_url
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Resolve a path against the base URL. Absolute URLs (entity links)
    /// are returned unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            self.inner.config.base_url.endpoint(path)
        }
    }

    /// GET a JSON document.
    pub async fn get<R: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<R> {
        let response = self.execute(Method::Get, url, params, &[], Body::Empty).await?;
        decode(url, &response)
    }

    /// POST a JSON body, or nothing, and decode the reply.
    pub async fn post<R: DeserializeOwned>(
        &self,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<R> {
        let body = body.map(Body::Json).unwrap_or_default();
        let response = self.execute(Method::Post, url, &[], &[], body).await?;
        decode(url, &response)
    }

    /// PUT a JSON body and decode the reply.
    pub async fn put<R: DeserializeOwned>(&self, url: &str, body: serde_json::Value) -> Result<R> {
        let response = self
            .execute(Method::Put, url, &[], &[], Body::Json(body))
            .await?;
        decode(url, &response)
    }

    /// PUT raw file bytes as `application/octet-stream`.
    pub async fn put_file(&self, url: &str, file: FileBody) -> Result<Response> {
        self.execute(
            Method::Put,
            url,
            &[],
            &[("Content-Type", "application/octet-stream")],
            Body::File(file),
        )
        .await
    }

    /// DELETE a resource. The reply body is ignored.
    pub async fn delete(&self, url: &str) -> Result<()> {
        self.execute(Method::Delete, url, &[], &[], Body::Empty)
            .await?;
        Ok(())
    }

    /// GET a resource and stream its body into `dest`.
    #[instrument(skip(self), fields(base = %self.inner.config.base_url))]
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let request = self.prepare(Method::Get, url, &[], &[], Body::Empty);
        debug!(url = %request.url, dest = %dest.display(), "download");
        let response = self.inner.transport.download(request, dest).await?;
        check_status(&response)?;
        Ok(())
    }

    /// Download a third-party URL into `dest`.
    ///
    /// Credentials, default parameters and default headers are not sent.
    #[instrument(skip(self))]
    pub async fn fetch_external(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(url, dest = %dest.display(), "external download");
        let request = Request::new(Method::Get, url);
        let response = self.inner.transport.download(request, dest).await?;
        check_status(&response)?;
        Ok(())
    }

    /// Execute a request and raise [`ApiError`] for any non-2xx status.
    #[instrument(skip(self, params, headers, body), fields(base = %self.inner.config.base_url))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
        body: Body,
    ) -> Result<Response> {
        let request = self.prepare(method, url, params, headers, body);
        debug!(%method, url = %request.url, "request");
        trace!(query = ?redacted_query(&request.query), "query parameters");

        let response = self.inner.transport.send(request).await?;
        trace!(status = response.status, "response");

        check_status(&response)?;
        Ok(response)
    }

    /// Merge defaults, per-call values and credentials into a request.
    ///
    /// Per-call parameters and headers replace defaults with the same name.
    fn prepare(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
        body: Body,
    ) -> Request {
        let config = &self.inner.config;
        let mut request = Request::new(method, self.url(url));

        for (name, value) in &config.params {
            set_param(&mut request.query, name, value);
        }
        for (name, value) in params {
            set_param(&mut request.query, name, value);
        }

        set_header(&mut request.headers, "Accept", "application/json");
        for (name, value) in &config.headers {
            set_header(&mut request.headers, name, value);
        }
        for (name, value) in headers {
            set_header(&mut request.headers, name, value);
        }

        if let Some(token) = &config.token {
            if config.token_placement.header() {
                set_header(&mut request.headers, "Authorization", &token.bearer());
            }
            if config.token_placement.query() {
                set_param(&mut request.query, "access_token", token.as_str());
            }
        }

        request.body = body;
        request
    }
}

fn set_param(query: &mut Vec<(String, String)>, name: &str, value: &str) {
    match query.iter_mut().find(|(k, _)| k == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => query.push((name.to_string(), value.to_string())),
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

fn redacted_query(query: &[(String, String)]) -> Vec<(&str, &str)> {
    query
        .iter()
        .map(|(k, v)| {
            if k == "access_token" {
                (k.as_str(), "[REDACTED]")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}

fn check_status(response: &Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ApiError::from_response(response.status, &response.body).into())
    }
}

/// Decode a 2xx body. An empty body decodes as JSON `null`.
pub(crate) fn decode<R: DeserializeOwned>(url: &str, response: &Response) -> Result<R> {
    let body: &[u8] = if response.body.is_empty() {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body).map_err(|source| Error::Decode {
        url: url.to_string(),
        source,
    })
}
