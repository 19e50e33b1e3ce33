//! # Token Exchange Seam
//!
//! OAuth-style credential-for-token exchange sits behind [`TokenExchanger`]
//! so authenticators never talk to the network directly. Production wires in
//! [`HttpTokenExchanger`]; tests script grants and failures.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AuthError, AuthResult};
use crate::config::HttpSettings;

/// A credential exchange request against a token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub token_endpoint: String,
    /// Form fields posted as `application/x-www-form-urlencoded`.
    pub form: Vec<(String, String)>,
}

impl TokenRequest {
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            form: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }
}

/// A granted access token.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, when the endpoint reported one.
    pub expires_in: Option<u64>,
}

/// Exchange credentials for a short-lived access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, request: TokenRequest) -> AuthResult<TokenGrant>;
}

/// Wire shape of a standard token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenEndpointReply {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token exchanger that POSTs form-encoded credentials over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    http: reqwest::Client,
}

impl HttpTokenExchanger {
    pub fn new(settings: &HttpSettings) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(settings.request_timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(settings.connect_timeout_ms))
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(&self, request: TokenRequest) -> AuthResult<TokenGrant> {
        debug!(
            endpoint = %request.token_endpoint,
            fields = request.form.len(),
            "Exchanging credentials for access token"
        );

        let response = self
            .http
            .post(&request.token_endpoint)
            .form(&request.form)
            .send()
            .await
            .map_err(|e| AuthError::Network {
                operation: "token_exchange".to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(status = status.as_u16(), body = %body, "Token endpoint rejected exchange");
            return Err(AuthError::Exchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let reply: TokenEndpointReply = response.json().await.map_err(|e| {
            AuthError::Exchange(format!("unparseable token endpoint response: {e}"))
        })?;

        Ok(TokenGrant {
            access_token: reply.access_token,
            expires_in: reply.expires_in,
        })
    }
}
