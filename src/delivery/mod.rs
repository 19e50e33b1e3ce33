//! # Push Delivery Layer
//!
//! Pluggable per-platform delivery behind one [`PushProvider`] trait.
//!
//! ## Overview
//!
//! Each supported platform (mobile A/B, desktop, web, topic broker) gets one
//! provider implementation holding exactly one authenticator and the shared
//! [`transport::PushTransport`] seam. Providers validate tokens structurally,
//! compose a platform-shaped body around the abstract notification payload,
//! and map upstream replies into [`DeliveryResponse`] categories.
//!
//! ## Failure contract
//!
//! Providers never return `Err` for expected failure modes: invalid tokens,
//! oversized payloads, expired channels, upstream rejections, and network
//! faults all come back as unsuccessful responses with a
//! [`DeliveryErrorCode`], so one bad device never aborts a job's fan-out.

pub mod apns;
pub mod fcm;
pub mod registry;
pub mod topic;
pub mod transport;
pub mod web_push;
pub mod wns;

pub use apns::ApnsProvider;
pub use fcm::FcmProvider;
pub use registry::{Platform, ProviderRegistry};
pub use topic::TopicBrokerProvider;
pub use transport::{HttpPushTransport, PushRequest, PushTransport, TransportError, TransportReply};
pub use web_push::WebPushProvider;
pub use wns::WnsProvider;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::models::notification::PushNotification;

/// Category of an expected delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryErrorCode {
    /// Device token / subscription is structurally invalid or revoked.
    InvalidSubscription,
    /// Composed platform body exceeds the platform's payload limit.
    PayloadTooLarge,
    /// The channel URI is no longer routable (expired or unregistered).
    ChannelExpired,
    /// The channel URI fails structural validation for the platform.
    InvalidChannelUri,
    /// The provider is not initialized or its platform support is absent.
    LibraryNotAvailable,
    /// The platform has no native topic delivery.
    TopicsNotSupported,
    /// Timeout or connection failure toward the platform.
    NetworkError,
    /// The platform rejected our credentials.
    Unauthorized,
    /// The platform rejected the request for any other reason.
    UpstreamRejected,
}

impl fmt::Display for DeliveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidSubscription => "INVALID_SUBSCRIPTION",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::ChannelExpired => "CHANNEL_EXPIRED",
            Self::InvalidChannelUri => "INVALID_CHANNEL_URI",
            Self::LibraryNotAvailable => "LIBRARY_NOT_AVAILABLE",
            Self::TopicsNotSupported => "TOPICS_NOT_SUPPORTED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::UpstreamRejected => "UPSTREAM_REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one delivery attempt. Expected failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<DeliveryErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl DeliveryResponse {
    pub fn success(message: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            message_id: Some(message_id.into()),
        }
    }

    pub fn failure(error_code: DeliveryErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: Some(error_code),
            message_id: None,
        }
    }

    /// Map a generic upstream HTTP status. Platform-specific statuses
    /// (e.g. expired-channel codes) are handled by providers before
    /// falling through to this.
    pub fn from_upstream_status(status: u16, detail: &str, message_id: String) -> Self {
        match status {
            s if (200..300).contains(&s) => {
                Self::success(format!("accepted with status {s}"), message_id)
            }
            401 | 403 => Self::failure(
                DeliveryErrorCode::Unauthorized,
                format!("platform rejected credentials ({status}): {detail}"),
            ),
            413 => Self::failure(
                DeliveryErrorCode::PayloadTooLarge,
                format!("platform rejected payload size ({status}): {detail}"),
            ),
            _ => Self::failure(
                DeliveryErrorCode::UpstreamRejected,
                format!("platform returned {status}: {detail}"),
            ),
        }
    }

    /// Map a token lifecycle failure into a delivery response.
    pub fn from_auth_error(error: &AuthError) -> Self {
        match error {
            AuthError::Network { detail, .. } => Self::failure(
                DeliveryErrorCode::NetworkError,
                format!("token refresh failed: {detail}"),
            ),
            other => Self::failure(
                DeliveryErrorCode::Unauthorized,
                format!("authentication failed: {other}"),
            ),
        }
    }

    /// Map a transport fault into a delivery response.
    pub fn from_transport_error(error: &TransportError) -> Self {
        Self::failure(DeliveryErrorCode::NetworkError, error.to_string())
    }
}

/// Static capability and diagnostic record for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub display_name: String,
    pub supports_topics: bool,
    pub max_payload_bytes: usize,
    pub initialized: bool,
}

/// One push platform behind a uniform delivery contract.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Prepare the provider for sending (token warm-up, handshake).
    /// Idempotent; calling again on an initialized provider is a no-op.
    async fn initialize(&self) -> crate::error::Result<()>;

    /// Pure structural validation of a device token for this platform.
    fn validate_device_token(&self, token: &str) -> bool;

    /// Send one notification to one device token.
    async fn send_notification(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> DeliveryResponse;

    /// Send one notification to many device tokens. The default is repeated
    /// single sends; platforms with batch endpoints may override.
    async fn send_bulk_notifications(
        &self,
        device_tokens: &[String],
        notification: &PushNotification,
    ) -> Vec<DeliveryResponse> {
        let mut responses = Vec::with_capacity(device_tokens.len());
        for token in device_tokens {
            responses.push(self.send_notification(token, notification).await);
        }
        responses
    }

    /// Publish one notification to a named topic. Only platforms with native
    /// topic delivery override this.
    async fn send_topic_notification(
        &self,
        topic: &str,
        _notification: &PushNotification,
    ) -> DeliveryResponse {
        DeliveryResponse::failure(
            DeliveryErrorCode::TopicsNotSupported,
            format!(
                "{} does not support topic delivery (topic: {topic})",
                self.platform_info().display_name
            ),
        )
    }

    /// Static capability/diagnostic record.
    fn platform_info(&self) -> PlatformInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&DeliveryErrorCode::InvalidSubscription).unwrap();
        assert_eq!(json, "\"INVALID_SUBSCRIPTION\"");
        assert_eq!(DeliveryErrorCode::ChannelExpired.to_string(), "CHANNEL_EXPIRED");
    }

    #[test]
    fn test_upstream_status_mapping() {
        let ok = DeliveryResponse::from_upstream_status(200, "", "m-1".to_string());
        assert!(ok.success);
        assert_eq!(ok.message_id.as_deref(), Some("m-1"));

        let unauthorized = DeliveryResponse::from_upstream_status(401, "bad token", "m".into());
        assert_eq!(unauthorized.error_code, Some(DeliveryErrorCode::Unauthorized));

        let too_large = DeliveryResponse::from_upstream_status(413, "", "m".into());
        assert_eq!(too_large.error_code, Some(DeliveryErrorCode::PayloadTooLarge));

        let rejected = DeliveryResponse::from_upstream_status(500, "oops", "m".into());
        assert_eq!(rejected.error_code, Some(DeliveryErrorCode::UpstreamRejected));
        assert!(rejected.message.contains("500"));
    }

    #[test]
    fn test_auth_error_mapping() {
        let network = AuthError::Network {
            operation: "token_exchange".to_string(),
            detail: "timed out".to_string(),
        };
        assert_eq!(
            DeliveryResponse::from_auth_error(&network).error_code,
            Some(DeliveryErrorCode::NetworkError)
        );

        let config = AuthError::Configuration("missing secret".to_string());
        assert_eq!(
            DeliveryResponse::from_auth_error(&config).error_code,
            Some(DeliveryErrorCode::Unauthorized)
        );
    }

    #[test]
    fn test_failure_response_carries_no_message_id() {
        let response = DeliveryResponse::failure(DeliveryErrorCode::PayloadTooLarge, "too big");
        assert!(!response.success);
        assert!(response.message_id.is_none());
    }
}
