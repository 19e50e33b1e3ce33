//! # Push Transport Seam
//!
//! Providers never touch the network directly; they hand a composed request
//! to a [`PushTransport`]. Production wires [`HttpPushTransport`]; tests
//! script replies and failures without sockets.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpSettings;
use crate::error::{FleetcastError, Result};

/// A fully composed push request ready for the wire.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl PushRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// Upstream platform reply, reduced to what response mapping needs.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// Transport-level faults. These map to the network-error delivery category;
/// they are never panics and never carry partial platform replies.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport failure: {0}")]
    Other(String),
}

/// Delivery seam between providers and the wire.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, request: PushRequest) -> std::result::Result<TransportReply, TransportError>;
}

/// HTTPS transport over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpPushTransport {
    http: reqwest::Client,
}

impl HttpPushTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(settings.request_timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(settings.connect_timeout_ms))
            .build()
            .map_err(|e| {
                FleetcastError::configuration("transport", format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn deliver(&self, request: PushRequest) -> std::result::Result<TransportReply, TransportError> {
        let mut builder = self.http.post(&request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        debug!(
            endpoint = %request.endpoint,
            body_bytes = request.body.len(),
            "Delivering push request"
        );

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::Connection(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());

        Ok(TransportReply { status, body })
    }
}
