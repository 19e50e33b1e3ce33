//! # Topic Broker Provider
//!
//! Fleet devices subscribed to a message broker. Device tokens are endpoint
//! URIs (`mqtts://` or `https://`) that must route to the configured broker
//! host; the URI path is the device's topic. Publishes go through the broker's
//! HTTPS bridge, and this is the one platform that supports direct
//! topic-addressed sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::transport::{PushRequest, PushTransport};
use super::{DeliveryErrorCode, DeliveryResponse, Platform, PlatformInfo, PushProvider};
use crate::auth::{ApiKeyAuthenticator, PlatformAuthenticator};
use crate::config::{AuthSettings, TopicBrokerSettings};
use crate::models::notification::PushNotification;

/// Broker-side message ceiling in bytes.
const MAX_PAYLOAD_BYTES: usize = 65_536;

pub struct TopicBrokerProvider {
    authenticator: Arc<ApiKeyAuthenticator>,
    transport: Arc<dyn PushTransport>,
    token_buffer: Duration,
    broker_host: String,
    publish_endpoint: String,
    initialized: AtomicBool,
}

impl TopicBrokerProvider {
    pub fn new(
        auth_settings: &AuthSettings,
        broker_settings: &TopicBrokerSettings,
        authenticator: Arc<ApiKeyAuthenticator>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            authenticator,
            transport,
            token_buffer: Duration::seconds(auth_settings.token_refresh_buffer_seconds),
            broker_host: broker_settings.broker_host.clone(),
            publish_endpoint: broker_settings.publish_endpoint.clone(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Extract the topic path from a device endpoint URI, rejecting URIs that
    /// do not route to the configured broker.
    fn topic_from_endpoint(&self, token: &str) -> Option<String> {
        let rest = token
            .strip_prefix("mqtts://")
            .or_else(|| token.strip_prefix("https://"))?;
        let (host, topic) = rest.split_once('/')?;
        if host != self.broker_host || topic.is_empty() {
            return None;
        }
        Some(topic.to_string())
    }

    async fn publish(&self, topic: &str, notification: &PushNotification) -> DeliveryResponse {
        let envelope = json!({
            "topic": topic,
            "payload": notification.payload(),
        });
        let body = match serde_json::to_vec(&envelope) {
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

        let request = PushRequest::new(&self.publish_endpoint)
            .with_headers(headers)
            .with_header("Content-Type", "application/json")
            .with_body(body);

        match self.transport.deliver(request).await {
            Ok(reply) => DeliveryResponse::from_upstream_status(
                reply.status,
                &reply.body,
                format!("topic-{}", Uuid::new_v4()),
            ),
            Err(e) => DeliveryResponse::from_transport_error(&e),
        }
    }
}

#[async_trait]
impl PushProvider for TopicBrokerProvider {
    async fn initialize(&self) -> crate::error::Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticator.ensure_valid_token(self.token_buffer).await?;
        self.initialized.store(true, Ordering::SeqCst);
        debug!(broker_host = %self.broker_host, "Topic broker provider initialized");
        Ok(())
    }

    fn validate_device_token(&self, token: &str) -> bool {
        self.topic_from_endpoint(token).is_some()
    }

    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "topic broker provider not initialized",
            );
        }
        // Resolve the topic before touching the network so misrouted URIs
        // never leave the process.
        let topic = match self.topic_from_endpoint(device_token) {
            Some(topic) => topic,
            None => {
                return DeliveryResponse::failure(
                    DeliveryErrorCode::InvalidChannelUri,
                    format!(
                        "endpoint URI does not route to broker {}",
                        self.broker_host
                    ),
                )
            }
        };
        self.publish(&topic, notification).await
    }

    async fn send_topic_notification(
        &self,
        topic: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return DeliveryResponse::failure(
                DeliveryErrorCode::LibraryNotAvailable,
                "topic broker provider not initialized",
            );
        }
        if topic.is_empty() {
            return DeliveryResponse::failure(
                DeliveryErrorCode::UpstreamRejected,
                "topic name must not be empty",
            );
        }
        self.publish(topic, notification).await
    }

    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: Platform::TopicBroker,
            display_name: "Topic Broker".to_string(),
            supports_topics: true,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}
