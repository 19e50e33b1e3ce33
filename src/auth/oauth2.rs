//! OAuth2 client-credentials authentication.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use super::exchange::{TokenExchanger, TokenRequest};
use super::{AuthError, AuthResult, PlatformAuthenticator, TokenCache};

/// Assumed token lifetime when the endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;

/// Authenticator that trades client credentials for short-lived bearer
/// tokens at a platform token endpoint.
pub struct OAuth2ClientCredentialsAuthenticator {
    platform: String,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    scope: Option<String>,
    exchanger: Arc<dyn TokenExchanger>,
    cache: TokenCache,
}

impl OAuth2ClientCredentialsAuthenticator {
    pub fn new(
        platform: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_endpoint: impl Into<String>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> AuthResult<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let token_endpoint = token_endpoint.into();

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(AuthError::Configuration(
                "client credentials must not be empty".to_string(),
            ));
        }
        if token_endpoint.is_empty() {
            return Err(AuthError::Configuration(
                "token endpoint must not be empty".to_string(),
            ));
        }

        Ok(Self {
            platform: platform.into(),
            client_id,
            client_secret,
            token_endpoint,
            scope: None,
            exchanger,
            cache: TokenCache::new(),
        })
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

#[async_trait]
impl PlatformAuthenticator for OAuth2ClientCredentialsAuthenticator {
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
        let mut request = TokenRequest::new(&self.token_endpoint)
            .with_field("grant_type", "client_credentials")
            .with_field("client_id", &self.client_id)
            .with_field("client_secret", &self.client_secret);
        if let Some(scope) = &self.scope {
            request = request.with_field("scope", scope);
        }

        let grant = self.exchanger.exchange(request).await?;
        let expires_in = grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS);
        let expires_at = Utc::now() + Duration::seconds(expires_in as i64);
        self.cache.store(grant.access_token, expires_at);

        debug!(
            platform = %self.platform,
            expires_in = expires_in,
            "Client-credentials token refreshed"
        );
        Ok(true)
    }

    fn is_token_valid(&self, buffer: Duration) -> bool {
        self.cache.is_valid(buffer)
    }
}
