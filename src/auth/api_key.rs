//! API-key authentication for platforms with long-lived static secrets.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;

use super::{AuthError, AuthResult, PlatformAuthenticator, TokenCache};

/// Nominal validity horizon for a static key. The key never really expires;
/// the horizon keeps the shared cache semantics uniform across strategies.
const API_KEY_VALIDITY_DAYS: i64 = 365;

/// Authenticator for platforms that accept a pre-shared API key.
pub struct ApiKeyAuthenticator {
    platform: String,
    header_name: String,
    /// Prefix prepended to the key in the header value, e.g. `key=`.
    value_prefix: String,
    cache: TokenCache,
}

impl ApiKeyAuthenticator {
    pub fn new(
        platform: impl Into<String>,
        header_name: impl Into<String>,
        value_prefix: impl Into<String>,
        api_key: impl Into<String>,
    ) -> AuthResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AuthError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }

        let authenticator = Self {
            platform: platform.into(),
            header_name: header_name.into(),
            value_prefix: value_prefix.into(),
            cache: TokenCache::new(),
        };
        authenticator
            .cache
            .store(api_key, Utc::now() + Duration::days(API_KEY_VALIDITY_DAYS));
        Ok(authenticator)
    }
}

#[async_trait]
impl PlatformAuthenticator for ApiKeyAuthenticator {
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
            self.header_name.clone(),
            format!("{}{}", self.value_prefix, cached.token),
        );
        Ok(headers)
    }

    async fn refresh_token(&self) -> AuthResult<bool> {
        // Static keys have nothing to refresh; extend the nominal horizon.
        if let Some(cached) = self.cache.current() {
            self.cache
                .store(cached.token, Utc::now() + Duration::days(API_KEY_VALIDITY_DAYS));
        }
        debug!(platform = %self.platform, "API key refresh is a no-op");
        Ok(true)
    }

    fn is_token_valid(&self, buffer: Duration) -> bool {
        self.cache.is_valid(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headers_carry_prefixed_key() {
        let auth =
            ApiKeyAuthenticator::new("topic_broker", "Authorization", "key=", "secret-123").unwrap();
        let headers = auth.auth_headers().await.unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "key=secret-123");
    }

    #[tokio::test]
    async fn test_static_key_is_long_lived() {
        let auth = ApiKeyAuthenticator::new("topic_broker", "X-Api-Key", "", "secret").unwrap();
        assert!(auth.is_token_valid(Duration::seconds(300)));
        assert!(auth.is_token_valid(Duration::days(30)));
        assert!(auth.refresh_token().await.unwrap());
        assert!(auth.is_token_valid(Duration::seconds(300)));
    }

    #[test]
    fn test_empty_key_fails_fast() {
        let result = ApiKeyAuthenticator::new("topic_broker", "X-Api-Key", "", "");
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }
}
