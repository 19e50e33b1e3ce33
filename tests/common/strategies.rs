//! Proptest strategies for delivery-pipeline values.

#![allow(dead_code)] // Only the property suite draws from these.

use proptest::prelude::*;

use fleetcast_core::delivery::DeliveryErrorCode;
use fleetcast_core::models::job::DeviceOutcome;

/// Strategy for plausible device identifiers
pub fn device_id_strategy() -> impl Strategy<Value = String> {
    "dev-[a-z0-9]{4,12}"
}

/// Strategy for one per-device send outcome
pub fn device_outcome_strategy() -> impl Strategy<Value = DeviceOutcome> {
    (device_id_strategy(), 0u8..3).prop_map(|(device_id, kind)| match kind {
        0 => DeviceOutcome::sent(&device_id, Some(format!("msg-{device_id}"))),
        1 => DeviceOutcome::failed(
            &device_id,
            Some(DeliveryErrorCode::InvalidSubscription),
            "scripted rejection",
        ),
        _ => DeviceOutcome::error(&device_id, "scripted error"),
    })
}

/// Strategy for a fan-out's worth of per-device outcomes
pub fn device_outcomes_strategy() -> impl Strategy<Value = Vec<DeviceOutcome>> {
    prop::collection::vec(device_outcome_strategy(), 0..40)
}

/// Strategy for receipt delays in milliseconds, up to a day
pub fn receipt_delay_ms_strategy() -> impl Strategy<Value = i64> {
    0i64..86_400_000
}

/// Strategy for token lifetimes and refresh buffers in seconds
pub fn lifetime_seconds_strategy() -> impl Strategy<Value = i64> {
    0i64..7200
}
