//! # Acknowledgment Tracking
//!
//! Devices confirm receipt of a push out-of-band, often seconds after the
//! platform accepted the send. The tracker matches each confirmation to its
//! push log row by message id, stamps the receipt time, and derives delivery
//! latency.
//!
//! The contract is deliberately forgiving: devices retry acks blindly, so
//! unknown message ids, duplicate acks, and skewed device clocks are all
//! absorbed as no-ops that still report success. First ack wins; a row is
//! never rewritten.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::delivery::Platform;
use crate::events::{names, EventPublisher};
use crate::logging::{log_error, log_push_operation};
use crate::models::push_log::DeliveryStatus;
use crate::store::PushLogStore;

/// Device-originated receipt confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckRequest {
    /// Message id the platform (or worker) assigned at send time.
    pub message_id: String,
    pub device_id: String,
    /// Outcome the device reports, usually `delivered`.
    pub status: DeliveryStatus,
    pub received_at: DateTime<Utc>,
    pub platform: Platform,
}

impl AckRequest {
    pub fn delivered(
        message_id: impl Into<String>,
        device_id: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            device_id: device_id.into(),
            status: DeliveryStatus::Delivered,
            received_at: Utc::now(),
            platform,
        }
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = status;
        self
    }
}

/// Response every ack gets, recognized or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckReceipt {
    pub status: String,
}

impl AckReceipt {
    fn acknowledged() -> Self {
        Self {
            status: "acknowledged".to_string(),
        }
    }
}

/// Matches device acks to push log rows and computes delivery latency.
pub struct AcknowledgmentTracker {
    log_store: Arc<dyn PushLogStore>,
    event_publisher: EventPublisher,
}

impl AcknowledgmentTracker {
    pub fn new(log_store: Arc<dyn PushLogStore>, event_publisher: EventPublisher) -> Self {
        Self {
            log_store,
            event_publisher,
        }
    }

    /// Apply a device receipt. Infallible by contract: whatever happens
    /// internally, the caller gets `{status: "acknowledged"}` back.
    pub async fn acknowledge(&self, request: AckRequest) -> AckReceipt {
        let mut log = match self.log_store.get_by_message_id(&request.message_id).await {
            Ok(Some(log)) => log,
            Ok(None) => {
                debug!(
                    message_id = %request.message_id,
                    device_id = %request.device_id,
                    "Ack for unknown message id, ignoring"
                );
                return AckReceipt::acknowledged();
            }
            Err(e) => {
                log_error(
                    "acknowledgment_tracker",
                    "lookup",
                    &e.to_string(),
                    Some(&request.message_id),
                );
                return AckReceipt::acknowledged();
            }
        };

        if let Err(reason) = log.mark_received(request.received_at, request.status) {
            // Duplicate ack or a receipt timestamped before the send
            debug!(
                message_id = %request.message_id,
                device_id = %request.device_id,
                reason = %reason,
                "Ack ignored"
            );
            return AckReceipt::acknowledged();
        }

        if let Err(e) = self.log_store.update(&log).await {
            log_error(
                "acknowledgment_tracker",
                "update",
                &e.to_string(),
                Some(&request.message_id),
            );
            return AckReceipt::acknowledged();
        }

        log_push_operation(
            "acknowledge",
            Some(&log.job_id.to_string()),
            Some(&log.device_id),
            Some(&log.platform.to_string()),
            "acknowledged",
            log.latency_ms.map(|ms| format!("latency {ms}ms")).as_deref(),
        );
        self.event_publisher
            .publish(
                names::PUSH_ACKNOWLEDGED,
                json!({
                    "job_id": log.job_id.to_string(),
                    "message_id": log.message_id,
                    "device_id": log.device_id,
                    "platform": log.platform,
                    "status": log.status,
                    "latency_ms": log.latency_ms,
                }),
            )
            .await;

        AckReceipt::acknowledged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobId;
    use crate::models::push_log::PushNotificationLog;
    use crate::store::InMemoryPushLogStore;
    use chrono::Duration;

    struct Fixture {
        store: Arc<InMemoryPushLogStore>,
        tracker: AcknowledgmentTracker,
        publisher: EventPublisher,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPushLogStore::new());
        let publisher = EventPublisher::new(16);
        let tracker = AcknowledgmentTracker::new(store.clone(), publisher.clone());
        Fixture {
            store,
            tracker,
            publisher,
        }
    }

    async fn seed_sent_row(store: &InMemoryPushLogStore) -> PushNotificationLog {
        let log = PushNotificationLog::sent("msg-001", JobId::new(), "dev-1", Platform::Fcm);
        store.insert(log.clone()).await.unwrap();
        log
    }

    #[tokio::test]
    async fn test_ack_marks_row_and_computes_latency() {
        let f = fixture();
        let sent = seed_sent_row(&f.store).await;
        let mut events = f.publisher.subscribe();

        let receipt = f
            .tracker
            .acknowledge(
                AckRequest::delivered("msg-001", "dev-1", Platform::Fcm)
                    .with_received_at(sent.sent_at + Duration::milliseconds(450)),
            )
            .await;
        assert_eq!(receipt.status, "acknowledged");

        let row = f
            .store
            .get_by_message_id("msg-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeliveryStatus::Delivered);
        assert_eq!(row.latency_ms, Some(450));
        assert!(row.received_at.is_some());

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, names::PUSH_ACKNOWLEDGED);
        assert_eq!(event.context["latency_ms"], 450);
        assert_eq!(event.context["device_id"], "dev-1");
    }

    #[tokio::test]
    async fn test_unknown_message_id_is_silent_success() {
        let f = fixture();
        let mut events = f.publisher.subscribe();

        let receipt = f
            .tracker
            .acknowledge(AckRequest::delivered("msg-404", "dev-1", Platform::Fcm))
            .await;
        assert_eq!(receipt.status, "acknowledged");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_ack_does_not_rewrite_row() {
        let f = fixture();
        let sent = seed_sent_row(&f.store).await;

        f.tracker
            .acknowledge(
                AckRequest::delivered("msg-001", "dev-1", Platform::Fcm)
                    .with_received_at(sent.sent_at + Duration::milliseconds(100)),
            )
            .await;
        let mut events = f.publisher.subscribe();
        let receipt = f
            .tracker
            .acknowledge(
                AckRequest::delivered("msg-001", "dev-1", Platform::Fcm)
                    .with_received_at(sent.sent_at + Duration::seconds(30)),
            )
            .await;
        assert_eq!(receipt.status, "acknowledged");

        // First ack wins
        let row = f
            .store
            .get_by_message_id("msg-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.latency_ms, Some(100));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_skewed_receipt_is_ignored() {
        let f = fixture();
        let sent = seed_sent_row(&f.store).await;

        let receipt = f
            .tracker
            .acknowledge(
                AckRequest::delivered("msg-001", "dev-1", Platform::Fcm)
                    .with_received_at(sent.sent_at - Duration::seconds(10)),
            )
            .await;
        assert_eq!(receipt.status, "acknowledged");

        let row = f
            .store
            .get_by_message_id("msg-001")
            .await
            .unwrap()
            .unwrap();
        assert!(row.awaiting_receipt());
        assert!(row.latency_ms.is_none());
    }

    #[tokio::test]
    async fn test_device_reported_failure_is_recorded() {
        let f = fixture();
        let sent = seed_sent_row(&f.store).await;

        f.tracker
            .acknowledge(
                AckRequest::delivered("msg-001", "dev-1", Platform::Fcm)
                    .with_status(DeliveryStatus::Failed)
                    .with_received_at(sent.sent_at + Duration::seconds(2)),
            )
            .await;

        let row = f
            .store
            .get_by_message_id("msg-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeliveryStatus::Failed);
        assert_eq!(row.latency_ms, Some(2000));
    }

    #[test]
    fn test_receipt_serialization_shape() {
        let receipt = AckReceipt::acknowledged();
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value, json!({"status": "acknowledged"}));
    }
}
