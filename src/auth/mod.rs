//! # Platform Authentication
//!
//! Token lifecycle management for the push platforms. Every platform speaks a
//! different credential dialect (static API key, OAuth2 client credentials,
//! self-issued signed tokens, service-account exchange) behind one
//! [`PlatformAuthenticator`] trait, so providers stay credential-agnostic.
//!
//! ## Token validity
//!
//! All strategies share [`TokenCache`]. A cached token is considered valid
//! only while `now < expires_at - buffer`; consumers refresh proactively via
//! [`PlatformAuthenticator::ensure_valid_token`] with the configured safety
//! buffer. Concurrent refreshes of a shared authenticator are benign
//! duplicate work: the last writer wins and every request still sees a valid
//! token.

pub mod api_key;
pub mod exchange;
pub mod oauth2;
pub mod service_account;
pub mod signed_jwt;

pub use api_key::ApiKeyAuthenticator;
pub use exchange::{HttpTokenExchanger, TokenExchanger, TokenGrant, TokenRequest};
pub use oauth2::OAuth2ClientCredentialsAuthenticator;
pub use service_account::{ServiceAccountAuthenticator, ServiceAccountCredentials};
pub use signed_jwt::SignedJwtAuthenticator;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use crate::logging::log_auth_operation;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Key parsing error: {0}")]
    KeyParsing(String),

    #[error("Credential file error: {0}")]
    CredentialFile(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Network error during {operation}: {detail}")]
    Network { operation: String, detail: String },

    #[error("No valid token available for {0}")]
    TokenUnavailable(String),

    #[error("JWT processing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// A cached platform token with its hard expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Shared token cache used by every authenticator strategy.
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached token. Last writer wins.
    pub fn store(&self, token: impl Into<String>, expires_at: DateTime<Utc>) {
        *self.inner.write() = Some(CachedToken {
            token: token.into(),
            expires_at,
        });
    }

    /// Clone out the current token, valid or not.
    pub fn current(&self) -> Option<CachedToken> {
        self.inner.read().clone()
    }

    /// Whether the cached token remains valid for at least `buffer` more.
    pub fn is_valid(&self, buffer: Duration) -> bool {
        match self.inner.read().as_ref() {
            Some(cached) => Utc::now() < cached.expires_at - buffer,
            None => false,
        }
    }

    /// The token string, but only while it satisfies the validity buffer.
    pub fn token_if_valid(&self, buffer: Duration) -> Option<String> {
        let guard = self.inner.read();
        let cached = guard.as_ref()?;
        if Utc::now() < cached.expires_at - buffer {
            Some(cached.token.clone())
        } else {
            None
        }
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Per-platform token lifecycle contract.
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Platform label for logging and diagnostics.
    fn platform_name(&self) -> &str;

    /// Headers to attach to an authenticated platform request.
    async fn auth_headers(&self) -> AuthResult<HashMap<String, String>>;

    /// Obtain a fresh token unconditionally. Returns `true` when a new token
    /// was cached.
    async fn refresh_token(&self) -> AuthResult<bool>;

    /// Whether the cached token remains valid for at least `buffer`.
    fn is_token_valid(&self, buffer: Duration) -> bool;

    /// Refresh only when the cached token is missing or expires within
    /// `buffer`. Redundant concurrent calls are harmless.
    async fn ensure_valid_token(&self, buffer: Duration) -> AuthResult<()> {
        if !self.is_token_valid(buffer) {
            match self.refresh_token().await {
                Ok(refreshed) => {
                    log_auth_operation(
                        "refresh",
                        self.platform_name(),
                        if refreshed { "refreshed" } else { "unchanged" },
                        None,
                    );
                }
                Err(e) => {
                    log_auth_operation(
                        "refresh",
                        self.platform_name(),
                        "failed",
                        Some(&e.to_string()),
                    );
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
