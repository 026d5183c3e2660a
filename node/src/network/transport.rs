// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Failed(String),
}

pub type Headers = Vec<(&'static str, String)>;

/// The HTTP client a peer connection talks through.
///
/// Implementations return whatever status the remote sent; only failures to
/// get any response at all are errors.
pub trait PeerTransport: Send + Sync + 'static {
    fn get(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;

    fn post(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
        let resp = req.send().await.map_err(map_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(map_reqwest)?;
        Ok(RawResponse { status, body: body.to_vec() })
    }
}

fn url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Failed(e.to_string())
    }
}

impl PeerTransport for HttpTransport {
    async fn get(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
    ) -> Result<RawResponse, TransportError> {
        let mut req = self.client.get(url(base_url, path));
        for (name, value) in headers {
            req = req.header(name, value);
        }
        self.send(req).await
    }

    async fn post(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
        body: Vec<u8>,
    ) -> Result<RawResponse, TransportError> {
        let mut req = self.client.post(url(base_url, path)).body(body);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        self.send(req).await
    }
}
