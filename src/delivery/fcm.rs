//! # Mobile Push Provider A (FCM-style)
//!
//! Registration-token platform speaking an HTTP v1 `messages:send` dialect.
//! Authentication is service-account based: a signed assertion is exchanged
//! for a short-lived bearer token before each send window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::transport::{PushRequest, PushTransport};
use super::{DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, PushProvider};
use crate::auth::{PlatformAuthenticator, ServiceAccountAuthenticator};
use crate::config::{AuthSettings, FcmSettings};
use crate::models::job::JobPriority;
use crate::models::notification::PushNotification;

/// Platform payload ceiling in bytes.
const MAX_PAYLOAD_BYTES: usize = 4096;
/// Registration tokens are long opaque strings from a fixed charset.
const MIN_TOKEN_LENGTH: usize = 64;

pub struct FcmProvider {
    authenticator: Arc<ServiceAccountAuthenticator>,
    transport: Arc<dyn PushTransport>,
    token_buffer: Duration,
    /// Fully-resolved send endpoint for the credential file's project.
    api_url: String,
    initialized: AtomicBool,
}

impl FcmProvider {
    pub fn new(
        settings: &FcmSettings,
        auth_settings: &AuthSettings,
        authenticator: Arc<ServiceAccountAuthenticator>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let api_url = format!(
            "{}/v1/projects/{}/messages:send",
            settings.endpoint_base.trim_end_matches('/'),
            authenticator.project_id()
        );
        Self {
            authenticator,
            transport,
            token_buffer: Duration::seconds(auth_settings.token_refresh_buffer_seconds),
            api_url,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Compose the v1 message body. Data values are stringified because the
    /// platform only accepts string-to-string data maps.
    fn build_message(&self, device_token: &str, notification: &PushNotification) -> Value {
        let data: serde_json::Map<String, Value> = notification
            .data
            .iter()
            .map(|(k, v)| {
                let s = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), Value::String(s))
            })
            .collect();

        let priority = match notification.priority {
            JobPriority::High | JobPriority::Critical => "HIGH",
            JobPriority::Low | JobPriority::Normal => "NORMAL",
        };

        json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": notification.title,
                    "body": notification.body,
                },
                "data": data,
                "android": {
                    "ttl": format!("{}s", notification.ttl_seconds),
                    "collapse_key": notification.collapse_key,
                    "priority": priority,
                },
            }
        })
    }

    /// The platform echoes a resource name for accepted messages; fall back
    /// to a synthesized id when the reply body is not parseable.
    fn extract_message_id(reply_body: &str) -> String {
        serde_json::from_str::<Value>(reply_body)
            .ok()
            .and_then(|v| v.get("name").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("fcm-{}", Uuid::new_v4()))
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn initialize(&self) -> crate::error::Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticator.ensure_valid_token(self.token_buffer).await?;
        self.initialized.store(true, Ordering::SeqCst);
        debug!(api_url = %self.api_url, "FCM provider initialized");
        Ok(())
    }

    fn validate_device_token(&self, token: &str) -> bool {
        token.len() >= MIN_TOKEN_LENGTH
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'))
    }

    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "FCM provider not initialized",
            );
        }
        if !self.validate_device_token(device_token) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::InvalidSubscription,
                "registration token failed structural validation",
            );
        }

        let body = match serde_json::to_vec(&self.build_message(device_token, notification)) {
            Ok(body) => body,
            Err(e) => {
                return DeliveryResponse::failure(
                    DeliveryErrorCode::UpstreamRejected,
                    format!("failed to serialize message body: {e}"),
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
            warn!(error = %e, "FCM token refresh failed before send");
            return DeliveryResponse::from_auth_error(&e);
        }
        let headers = match self.authenticator.auth_headers().await {
            Ok(headers) => headers,
            Err(e) => return DeliveryResponse::from_auth_error(&e),
        };

        let request = PushRequest::new(&self.api_url)
            .with_headers(headers)
            .with_header("Content-Type", "application/json")
            .with_body(body);

        match self.transport.deliver(request).await {
            Ok(reply) => {
                let message_id = Self::extract_message_id(&reply.body);
                DeliveryResponse::from_upstream_status(reply.status, &reply.body, message_id)
            }
            Err(e) => DeliveryResponse::from_transport_error(&e),
        }
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: Platform::Fcm,
            display_name: "Mobile Push (FCM)".to_string(),
            supports_topics: false,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}
