//! # Desktop Push Provider (WNS-style)
//!
//! Channel-URI platform: every device registers an HTTPS channel under the
//! platform's notify host, and pushes are POSTed straight to that URI.
//! Authentication is OAuth2 client credentials. Dead channels answer 404/410
//! and map to the expired-channel category so the registry layer can prune.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use super::transport::{PushRequest, PushTransport};
use super::{DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, PushProvider};
use crate::auth::{OAuth2ClientCredentialsAuthenticator, PlatformAuthenticator};
use crate::config::{AuthSettings, WnsSettings};
use crate::models::notification::PushNotification;

/// Platform payload ceiling in bytes.
const MAX_PAYLOAD_BYTES: usize = 5120;

pub struct WnsProvider {
    authenticator: Arc<OAuth2ClientCredentialsAuthenticator>,
    transport: Arc<dyn PushTransport>,
    token_buffer: Duration,
    channel_host_suffix: String,
    initialized: AtomicBool,
}

impl WnsProvider {
    pub fn new(
        settings: &WnsSettings,
        auth_settings: &AuthSettings,
        authenticator: Arc<OAuth2ClientCredentialsAuthenticator>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            authenticator,
            transport,
            token_buffer: Duration::seconds(auth_settings.token_refresh_buffer_seconds),
            channel_host_suffix: settings.channel_host_suffix.clone(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Host portion of an https channel URI, or `None` when not https.
    fn channel_host(uri: &str) -> Option<&str> {
        let rest = uri.strip_prefix("https://")?;
        let host = rest.split('/').next()?;
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }
}

#[async_trait]
impl PushProvider for WnsProvider {
    async fn initialize(&self) -> crate::error::Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticator.ensure_valid_token(self.token_buffer).await?;
        self.initialized.store(true, Ordering::SeqCst);
        debug!("WNS provider initialized");
        Ok(())
    }

    fn validate_device_token(&self, token: &str) -> bool {
        match Self::channel_host(token) {
            Some(host) => host.ends_with(&self.channel_host_suffix),
            None => false,
        }
    }

    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "WNS provider not initialized",
            );
        }
        // Structural failures never reach the network
        if !self.validate_device_token(device_token) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::InvalidChannelUri,
                format!(
                    "channel URI must be https under *{}",
                    self.channel_host_suffix
                ),
            );
        }

        let body = match serde_json::to_vec(&notification.payload()) {
            Ok(body) => body,
            Err(e) => {
                return DeliveryResponse::failure(
                    DeliveryErrorCode::UpstreamRejected,
                    format!("failed to serialize payload: {e}"),
                )
            }
        };
        if body.len() > MAX_PAYLOAD_BYTES {
            return DeliveryResponse::failure(
                DeliveryErrorCode::PayloadTooLarge,
                format!("payload is {} bytes, limit {MAX_PAYLOAD_BYTES}", body.len()),
            );
        }

        if let Err(e) = self.authenticator.ensure_valid_token(self.token_buffer).await {
            return DeliveryResponse::from_auth_error(&e);
        }
        let headers = match self.authenticator.auth_headers().await {
            Ok(headers) => headers,
            Err(e) => return DeliveryResponse::from_auth_error(&e),
        };

        let request = PushRequest::new(device_token)
            .with_headers(headers)
            .with_header("Content-Type", "application/octet-stream")
            .with_header("X-WNS-Type", "wns/raw")
            .with_header("X-WNS-Cache-Policy", "cache")
            .with_header("X-WNS-TTL", notification.ttl_seconds.to_string())
            .with_header("X-WNS-Tag", &notification.collapse_key)
            .with_body(body);

        match self.transport.deliver(request).await {
            Ok(reply) => match reply.status {
                // Dead channel: expired registration or uninstalled app
                404 | 410 => DeliveryResponse::failure(
                    DeliveryErrorCode::ChannelExpired,
                    format!("channel no longer routable (status {})", reply.status),
                ),
                status => DeliveryResponse::from_upstream_status(
                    status,
                    &reply.body,
                    format!("wns-{}", Uuid::new_v4()),
                ),
            },
            Err(e) => DeliveryResponse::from_transport_error(&e),
        }
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: Platform::Wns,
            display_name: "Desktop Push (WNS)".to_string(),
            supports_topics: false,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::exchange::{TokenExchanger, TokenGrant, TokenRequest};
    use crate::auth::AuthResult;
    use crate::delivery::transport::{TransportError, TransportReply};
    use crate::models::job::{Job, JobTarget};
    use parking_lot::Mutex;
    use serde_json::json;

    struct StaticExchanger;

    #[async_trait]
    impl TokenExchanger for StaticExchanger {
        async fn exchange(&self, _request: TokenRequest) -> AuthResult<TokenGrant> {
            Ok(TokenGrant {
                access_token: "wns-access-token".to_string(),
                expires_in: Some(86400),
            })
        }
    }

    struct ScriptedTransport {
        status: u16,
        seen: Mutex<Vec<PushRequest>>,
    }

    impl ScriptedTransport {
        fn replying(status: u16) -> Arc<Self> {
            Arc::new(Self { status, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        async fn deliver(&self, request: PushRequest) -> Result<TransportReply, TransportError> {
            self.seen.lock().push(request);
            Ok(TransportReply { status: self.status, body: String::new() })
        }
    }

    fn provider_with(transport: Arc<ScriptedTransport>) -> WnsProvider {
        let settings = WnsSettings {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            ..WnsSettings::default()
        };
        let authenticator = Arc::new(
            OAuth2ClientCredentialsAuthenticator::new(
                "wns",
                &settings.client_id,
                &settings.client_secret,
                &settings.token_endpoint,
                Arc::new(StaticExchanger),
            )
            .unwrap()
            .with_scope("notify.windows.com"),
        );
        WnsProvider::new(&settings, &AuthSettings::default(), authenticator, transport)
    }

    fn channel_uri() -> String {
        "https://db5p.notify.windows.com/?token=AwYAAAB%2fQAY".to_string()
    }

    fn notification() -> PushNotification {
        let job = Job::new(
            "update_kiosk_layout".to_string(),
            JobTarget::Device { device_id: "kiosk-7".to_string() },
            "https://config.example.com/site-002/v4".to_string(),
            "20250817.140000".to_string(),
            "cfg-kiosk-7".to_string(),
        );
        PushNotification::for_job(&job)
    }

    #[test]
    fn test_channel_uri_validation() {
        let provider = provider_with(ScriptedTransport::replying(200));
        assert!(provider.validate_device_token(&channel_uri()));
        // Wrong scheme
        assert!(!provider.validate_device_token("http://db5p.notify.windows.com/?token=x"));
        // Wrong host
        assert!(!provider.validate_device_token("https://evil.example.com/?token=x"));
        // Not a URI at all
        assert!(!provider.validate_device_token("not-a-channel"));
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected_without_network() {
        let transport = ScriptedTransport::replying(200);
        let provider = provider_with(transport.clone());
        provider.initialize().await.unwrap();

        let response = provider
            .send_notification("https://evil.example.com/x", &notification())
            .await;
        assert_eq!(response.error_code, Some(DeliveryErrorCode::InvalidChannelUri));
        assert!(transport.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_posts_to_channel_with_wns_headers() {
        let transport = ScriptedTransport::replying(200);
        let provider = provider_with(transport.clone());
        provider.initialize().await.unwrap();

        let response = provider.send_notification(&channel_uri(), &notification()).await;
        assert!(response.success);

        let seen = transport.seen.lock();
        let request = &seen[0];
        assert_eq!(request.endpoint, channel_uri());
        assert_eq!(request.headers.get("X-WNS-Type").unwrap(), "wns/raw");
        assert_eq!(request.headers.get("X-WNS-Tag").unwrap(), "cfg-kiosk-7");
        assert_eq!(
            request.headers.get("Authorization").unwrap(),
            "Bearer wns-access-token"
        );
    }

    #[tokio::test]
    async fn test_dead_channel_maps_to_channel_expired() {
        for status in [404_u16, 410] {
            let provider = provider_with(ScriptedTransport::replying(status));
            provider.initialize().await.unwrap();
            let response = provider.send_notification(&channel_uri(), &notification()).await;
            assert_eq!(
                response.error_code,
                Some(DeliveryErrorCode::ChannelExpired),
                "status {status} should map to expired channel"
            );
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let provider = provider_with(ScriptedTransport::replying(200));
        provider.initialize().await.unwrap();

        let mut big = notification();
        big.data.insert("blob".to_string(), json!("x".repeat(MAX_PAYLOAD_BYTES)));
        let response = provider.send_notification(&channel_uri(), &big).await;
        assert_eq!(response.error_code, Some(DeliveryErrorCode::PayloadTooLarge));
    }
}
