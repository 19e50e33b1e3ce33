//! # Web Push Provider
//!
//! Browser push: the device token is a serialized subscription object (push
//! service endpoint plus client key material), and the provider POSTs to the
//! subscription's own endpoint with a self-issued signed assertion
//! (VAPID-style). Subscriptions that fail structural validation are rejected
//! before any network traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::transport::{PushRequest, PushTransport};
use super::{DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, PushProvider};
use crate::auth::{PlatformAuthenticator, SignedJwtAuthenticator};
use crate::config::AuthSettings;
use crate::models::job::JobPriority;
use crate::models::notification::PushNotification;

/// Platform payload ceiling in bytes.
const MAX_PAYLOAD_BYTES: usize = 4078;

/// Client key material inside a subscription.
#[derive(Debug, Deserialize)]
struct SubscriptionKeys {
    p256dh: String,
    auth: String,
}

/// The subscription object browsers hand out at registration time.
#[derive(Debug, Deserialize)]
struct Subscription {
    endpoint: String,
    keys: SubscriptionKeys,
}

impl Subscription {
    /// Parse and structurally validate a serialized subscription.
    fn parse(token: &str) -> Option<Self> {
        let subscription: Subscription = serde_json::from_str(token).ok()?;
        if !subscription.endpoint.starts_with("https://") {
            return None;
        }
        if subscription.keys.p256dh.is_empty() || subscription.keys.auth.is_empty() {
            return None;
        }
        Some(subscription)
    }
}

pub struct WebPushProvider {
    authenticator: Arc<SignedJwtAuthenticator>,
    transport: Arc<dyn PushTransport>,
    token_buffer: Duration,
    initialized: AtomicBool,
}

impl WebPushProvider {
    pub fn new(
        auth_settings: &AuthSettings,
        authenticator: Arc<SignedJwtAuthenticator>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            authenticator,
            transport,
            token_buffer: Duration::seconds(auth_settings.token_refresh_buffer_seconds),
            initialized: AtomicBool::new(false),
        }
    }

    fn urgency(priority: JobPriority) -> &'static str {
        match priority {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High | JobPriority::Critical => "high",
        }
    }
}

#[async_trait]
impl PushProvider for WebPushProvider {
    async fn initialize(&self) -> crate::error::Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticator.ensure_valid_token(self.token_buffer).await?;
        self.initialized.store(true, Ordering::SeqCst);
        debug!("Web push provider initialized");
        Ok(())
    }

    fn validate_device_token(&self, token: &str) -> bool {
        Subscription::parse(token).is_some()
    }

    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "web push provider not initialized",
            );
        }
        let subscription = match Subscription::parse(device_token) {
            Some(subscription) => subscription,
            None => {
                return DeliveryResponse::failure(
                    DeliveryErrorCode::InvalidSubscription,
                    "token is not a valid push subscription object",
                )
            }
        };

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

        let request = PushRequest::new(&subscription.endpoint)
            .with_headers(headers)
            .with_header("Content-Type", "application/json")
            .with_header("TTL", notification.ttl_seconds.to_string())
            .with_header("Topic", &notification.collapse_key)
            .with_header("Urgency", Self::urgency(notification.priority))
            .with_body(body);

        match self.transport.deliver(request).await {
            Ok(reply) => match reply.status {
                // Push services answer 404/410 for unsubscribed endpoints
                404 | 410 => DeliveryResponse::failure(
                    DeliveryErrorCode::InvalidSubscription,
                    format!("subscription no longer valid (status {})", reply.status),
                ),
                status => DeliveryResponse::from_upstream_status(
                    status,
                    &reply.body,
                    format!("webpush-{}", Uuid::new_v4()),
                ),
            },
            Err(e) => DeliveryResponse::from_transport_error(&e),
        }
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: Platform::WebPush,
            display_name: "Web Push".to_string(),
            supports_topics: false,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}
