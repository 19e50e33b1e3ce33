//! # Mobile Push Provider B (APNs-style)
//!
//! Hex device-token platform with per-device send endpoints. Authentication
//! is a self-issued provider token signed with the team key; no exchange
//! round trip is involved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::transport::{PushRequest, PushTransport};
use super::{DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, PushProvider};
use crate::auth::{PlatformAuthenticator, SignedJwtAuthenticator};
use crate::config::{ApnsSettings, AuthSettings};
use crate::models::job::JobPriority;
use crate::models::notification::PushNotification;

/// Platform payload ceiling in bytes.
const MAX_PAYLOAD_BYTES: usize = 4096;
/// Device tokens are exactly 64 hex characters.
const TOKEN_LENGTH: usize = 64;

pub struct ApnsProvider {
    authenticator: Arc<SignedJwtAuthenticator>,
    transport: Arc<dyn PushTransport>,
    token_buffer: Duration,
    endpoint_base: String,
    bundle_topic: String,
    initialized: AtomicBool,
}

impl ApnsProvider {
    pub fn new(
        settings: &ApnsSettings,
        auth_settings: &AuthSettings,
        authenticator: Arc<SignedJwtAuthenticator>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            authenticator,
            transport,
            token_buffer: Duration::seconds(auth_settings.token_refresh_buffer_seconds),
            endpoint_base: settings.endpoint_base.trim_end_matches('/').to_string(),
            bundle_topic: settings.bundle_topic.clone(),
            initialized: AtomicBool::new(false),
        }
    }

    /// The alert body plus data keys hoisted to the envelope top level, the
    /// way this platform expects custom payload fields.
    fn build_body(&self, notification: &PushNotification) -> Value {
        let mut body = json!({
            "aps": {
                "alert": {
                    "title": notification.title,
                    "body": notification.body,
                },
                "content-available": 1,
            }
        });
        if let Some(map) = body.as_object_mut() {
            for (key, value) in &notification.data {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }

    fn priority_header(priority: JobPriority) -> &'static str {
        match priority {
            JobPriority::High | JobPriority::Critical => "10",
            JobPriority::Low | JobPriority::Normal => "5",
        }
    }
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn initialize(&self) -> crate::error::Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticator.ensure_valid_token(self.token_buffer).await?;
        self.initialized.store(true, Ordering::SeqCst);
        debug!(endpoint_base = %self.endpoint_base, "APNs provider initialized");
        Ok(())
    }

    fn validate_device_token(&self, token: &str) -> bool {
        token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_hexdigit())
    }

    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "APNs provider not initialized",
            );
        }
        if !self.validate_device_token(device_token) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::InvalidSubscription,
                "device token is not 64 hex characters",
            );
        }

        let body = match serde_json::to_vec(&self.build_body(notification)) {
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

        let expiration = (Utc::now() + Duration::seconds(i64::from(notification.ttl_seconds)))
            .timestamp()
            .to_string();

        let request = PushRequest::new(format!("{}/3/device/{device_token}", self.endpoint_base))
            .with_headers(headers)
            .with_header("Content-Type", "application/json")
            .with_header("apns-topic", &self.bundle_topic)
            .with_header("apns-expiration", expiration)
            .with_header("apns-collapse-id", &notification.collapse_key)
            .with_header("apns-priority", Self::priority_header(notification.priority))
            .with_body(body);

        match self.transport.deliver(request).await {
            Ok(reply) => {
                // This platform returns an empty body on accept; ids are local
                let message_id = format!("apns-{}", Uuid::new_v4());
                match reply.status {
                    410 => DeliveryResponse::failure(
                        DeliveryErrorCode::InvalidSubscription,
                        "device token is no longer active",
                    ),
                    status => {
                        DeliveryResponse::from_upstream_status(status, &reply.body, message_id)
                    }
                }
            }
            Err(e) => DeliveryResponse::from_transport_error(&e),
        }
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: Platform::Apns,
            display_name: "Mobile Push (APNs)".to_string(),
            supports_topics: false,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}
