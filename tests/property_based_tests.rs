//! Property-style invariants over the pure pieces of the delivery pipeline:
//! outcome aggregation, receipt latency accounting, and token validity.

mod common;

use chrono::Duration;
use common::strategies::*;
use fleetcast_core::auth::TokenCache;
use fleetcast_core::delivery::Platform;
use fleetcast_core::models::job::{DeviceSendStatus, JobId, JobOutcome, OutcomeKind};
use fleetcast_core::models::push_log::{DeliveryStatus, PushNotificationLog};
use proptest::prelude::*;

proptest! {
    /// Property: aggregate counters always reconcile with the per-device list
    #[test]
    fn outcome_counters_reconcile(devices in device_outcomes_strategy()) {
        let outcome = JobOutcome::from_devices(devices.clone());
        prop_assert_eq!(outcome.total, devices.len());
        prop_assert_eq!(outcome.successful + outcome.failed, outcome.total);

        let sent = devices
            .iter()
            .filter(|d| d.status == DeviceSendStatus::Sent)
            .count();
        prop_assert_eq!(outcome.successful, sent);
        prop_assert_eq!(outcome.status, OutcomeKind::Dispatched);
    }

    /// Property: latency equals the receipt delta and is never negative
    #[test]
    fn latency_matches_receipt_delta(delay_ms in receipt_delay_ms_strategy()) {
        let mut log = PushNotificationLog::sent("msg-1", JobId::new(), "dev-1", Platform::Fcm);
        let received = log.sent_at + Duration::milliseconds(delay_ms);
        prop_assert!(log.mark_received(received, DeliveryStatus::Delivered).is_ok());
        prop_assert_eq!(log.latency_ms, Some(delay_ms));
    }

    /// Property: receipts that predate the send never record a latency
    #[test]
    fn early_receipts_are_rejected(delay_ms in 1i64..86_400_000) {
        let mut log = PushNotificationLog::sent("msg-1", JobId::new(), "dev-1", Platform::Fcm);
        let received = log.sent_at - Duration::milliseconds(delay_ms);
        prop_assert!(log.mark_received(received, DeliveryStatus::Delivered).is_err());
        prop_assert_eq!(log.latency_ms, None);
        prop_assert!(log.awaiting_receipt());
    }

    /// Property: a receipt is write-once regardless of later timestamps
    #[test]
    fn receipts_are_write_once(
        first_ms in 0i64..3_600_000,
        second_ms in 0i64..3_600_000,
    ) {
        let mut log = PushNotificationLog::sent("msg-1", JobId::new(), "dev-1", Platform::Fcm);
        log.mark_received(
            log.sent_at + Duration::milliseconds(first_ms),
            DeliveryStatus::Delivered,
        )
        .unwrap();

        let second = log.sent_at + Duration::milliseconds(second_ms);
        prop_assert!(log.mark_received(second, DeliveryStatus::Failed).is_err());
        prop_assert_eq!(log.latency_ms, Some(first_ms));
        prop_assert_eq!(log.status, DeliveryStatus::Delivered);
    }

    /// Property: cached tokens are valid exactly while the refresh buffer
    /// still fits before expiry
    #[test]
    fn token_validity_respects_buffer(
        lifetime in lifetime_seconds_strategy(),
        buffer in lifetime_seconds_strategy(),
    ) {
        // Skip near-boundary pairs where clock movement could flip the answer
        prop_assume!((lifetime - buffer).abs() > 2);

        let cache = TokenCache::new();
        cache.store("tok", chrono::Utc::now() + Duration::seconds(lifetime));
        prop_assert_eq!(cache.is_valid(Duration::seconds(buffer)), lifetime > buffer);
    }
}

mod outcome_invariants {
    use fleetcast_core::models::job::{JobOutcome, OutcomeKind};

    #[test]
    fn test_empty_target_outcome_shape() {
        let outcome = JobOutcome::no_devices();
        assert_eq!(outcome.status, OutcomeKind::NoDevices);
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.successful, 0);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.devices.is_empty());
    }

    #[test]
    fn test_dispatched_outcome_from_no_outcomes_is_empty() {
        let outcome = JobOutcome::from_devices(Vec::new());
        assert_eq!(outcome.status, OutcomeKind::Dispatched);
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.failed, 0);
    }
}
