use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

/// Raw outcome of a GET: status line and undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Performs a single GET. An `Err` means no response was obtained at all.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to send request to Weather Underground")?;

        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .context("Failed to read Weather Underground response body")?;

        Ok(TransportResponse { status, body })
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
