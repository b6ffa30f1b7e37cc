// src/core/net.rs
// Outbound HTTP. The search client only sees the `Transport` trait so tests can
// swap in a recording fake; `ReqwestTransport` is the real thing.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::consts::USER_AGENT;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Status + body of a finished exchange. Non-2xx is not an error at this level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST an already-encoded form body.
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: String,
    ) -> Result<HttpResponse, TransportError>;
}

/// `reqwest` client with its own defaults. No timeout is imposed here.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: String,
    ) -> Result<HttpResponse, TransportError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let invalid = |reason: String| TransportError::InvalidHeader { name: s!(*name), reason };
            let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let val = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            map.insert(key, val);
        }

        logd!(%url, bytes = body.len(), "POST");
        let resp = self.http.post(url).headers(map).body(body).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        logd!(status, bytes = body.len(), "response received");

        Ok(HttpResponse { status, body })
    }
}
