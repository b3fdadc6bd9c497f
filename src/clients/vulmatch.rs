//! Client for the upstream Vulmatch service: raw request forwarding for the
//! proxy endpoints plus the JSON calls used by the CVE sync chain and schema
//! generation.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::errors::UpstreamError;

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Incoming request headers that are never forwarded upstream.
pub const DROPPED_HEADERS: [header::HeaderName; 2] = [header::HOST, header::CONTENT_LENGTH];

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path below `/api/v1/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct VulmatchClient {
    http: Client,
    base_url: String,
}

impl VulmatchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.vulmatch_service_base_url)
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn url(&self, path: &str) -> UpstreamResult<Url> {
        if !self.is_configured() {
            return Err(UpstreamError::NotConfigured);
        }
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Forwards a request to `{base}/api/v1/{path}` and relays the answer
    /// as-is. Redirects are returned to the caller, not followed.
    pub async fn forward(&self, request: ForwardRequest) -> UpstreamResult<ForwardResponse> {
        let mut url = self.url(&format!("/api/v1/{}", request.path))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        debug!("Forwarding {} {}", request.method, url);

        let mut headers = request.headers;
        for name in DROPPED_HEADERS.iter() {
            headers.remove(name);
        }

        let mut builder = self.http.request(request.method, url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(ForwardResponse {
            status,
            content_type,
            body,
        })
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> UpstreamResult<Value> {
        let url = self.url(path)?;
        debug!("POST {} {}", url, body);
        let response = self.http.post(url).json(body).send().await?;
        let payload = response.json::<Value>().await?;
        debug!("Upstream answered {}", payload);
        Ok(payload)
    }

    pub async fn get_json(&self, path: &str) -> UpstreamResult<Value> {
        let url = self.url(path)?;
        let response = self.http.get(url).send().await?;
        Ok(response.json::<Value>().await?)
    }

    /// Raw OpenAPI document served by the upstream at `/api/schema/`.
    pub async fn fetch_schema(&self) -> UpstreamResult<String> {
        let url = self.url("/api/schema/")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Payload(format!(
                "schema endpoint answered {}",
                status
            )));
        }
        Ok(response.text().await?)
    }
}
