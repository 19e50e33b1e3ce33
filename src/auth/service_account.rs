//! # Service-Account Authentication
//!
//! Loads a JSON credential file at construction (missing or malformed files
//! fail fast), then trades a self-signed assertion for access tokens at the
//! file's token URI through the [`TokenExchanger`] seam.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::exchange::{TokenExchanger, TokenRequest};
use super::{AuthError, AuthResult, PlatformAuthenticator, TokenCache};

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;
const ASSERTION_VALIDITY_SECONDS: i64 = 3600;

/// Service account credentials loaded from a JSON key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    /// The cloud project the account belongs to.
    pub project_id: String,

    /// The service account email; becomes the assertion issuer.
    #[serde(default)]
    pub client_email: String,

    /// The private key material used to sign assertions.
    #[serde(default)]
    pub private_key: String,

    /// Token endpoint assertions are exchanged at.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Claims of the signed assertion posted to the token endpoint.
#[derive(Debug, Serialize)]
struct ExchangeClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Authenticator backed by a service-account key file.
pub struct ServiceAccountAuthenticator {
    platform: String,
    credentials: ServiceAccountCredentials,
    scope: String,
    exchanger: Arc<dyn TokenExchanger>,
    cache: TokenCache,
}

impl ServiceAccountAuthenticator {
    /// Load credentials from a JSON key file. Fails fast when the file is
    /// missing, unreadable, or structurally invalid.
    pub fn from_credentials_file(
        platform: impl Into<String>,
        path: &Path,
        scope: impl Into<String>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> AuthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::CredentialFile(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)
            .map_err(|e| AuthError::CredentialFile(format!("failed to parse credentials JSON: {e}")))?;

        Self::from_credentials(platform, credentials, scope, exchanger)
    }

    /// Build from pre-parsed credentials.
    pub fn from_credentials(
        platform: impl Into<String>,
        credentials: ServiceAccountCredentials,
        scope: impl Into<String>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> AuthResult<Self> {
        if credentials.project_id.is_empty() {
            return Err(AuthError::Configuration(
                "service account credentials missing project_id".to_string(),
            ));
        }
        if credentials.private_key.is_empty() {
            return Err(AuthError::Configuration(
                "service account credentials missing private_key".to_string(),
            ));
        }

        debug!(
            project_id = %credentials.project_id,
            token_uri = %credentials.token_uri,
            "Service account credentials loaded"
        );

        Ok(Self {
            platform: platform.into(),
            credentials,
            scope: scope.into(),
            exchanger,
            cache: TokenCache::new(),
        })
    }

    /// The project the credentials belong to.
    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    /// Sign the exchange assertion. PEM RSA keys sign RS256, PEM EC keys
    /// ES256; any other material is treated as a shared secret (HS256).
    fn sign_assertion(&self) -> AuthResult<String> {
        let key_material = &self.credentials.private_key;
        let (algorithm, key) = if key_material.contains("-----BEGIN") {
            match EncodingKey::from_rsa_pem(key_material.as_bytes()) {
                Ok(key) => (Algorithm::RS256, key),
                Err(_) => {
                    let key = EncodingKey::from_ec_pem(key_material.as_bytes()).map_err(|e| {
                        AuthError::KeyParsing(format!("invalid service account key: {e}"))
                    })?;
                    (Algorithm::ES256, key)
                }
            }
        } else {
            (
                Algorithm::HS256,
                EncodingKey::from_secret(key_material.as_bytes()),
            )
        };

        let now = Utc::now();
        let claims = ExchangeClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_VALIDITY_SECONDS)).timestamp(),
        };

        Ok(encode(&Header::new(algorithm), &claims, &key)?)
    }
}

#[async_trait]
impl PlatformAuthenticator for ServiceAccountAuthenticator {
    fn platform_name(&self) -> &str {
        &self.platform
    }

    async fn auth_headers(&self) -> AuthResult<HashMap<String, String>> {
        let cached = self
            .cache
            .current()
            .ok_or_else(|| AuthError::TokenUnavailable(self.platform.clone()))?;

        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", cached.token),
        );
        Ok(headers)
    }

    async fn refresh_token(&self) -> AuthResult<bool> {
        let assertion = self.sign_assertion()?;
        let request = TokenRequest::new(&self.credentials.token_uri)
            .with_field("grant_type", JWT_BEARER_GRANT_TYPE)
            .with_field("assertion", assertion);

        let grant = self.exchanger.exchange(request).await?;
        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        self.cache.store(
            grant.access_token,
            Utc::now() + Duration::seconds(expires_in as i64),
        );

        debug!(
            platform = %self.platform,
            project_id = %self.credentials.project_id,
            expires_in = expires_in,
            "Service account token refreshed"
        );
        Ok(true)
    }

    fn is_token_valid(&self, buffer: Duration) -> bool {
        self.cache.is_valid(buffer)
    }
}
