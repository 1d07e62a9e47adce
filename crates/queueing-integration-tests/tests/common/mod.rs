//! Common test utilities for queueing integration tests
//!
//! Lease durations are scaled down so lifecycle tests finish quickly:
//! a "30 second" visibility timeout becomes [`VISIBILITY_MILLIS`].

use chrono::Duration;
use queueing::{InMemoryConfig, InMemoryQueueingProvider, LeasePolicy};

/// Visibility timeout used by lifecycle tests
pub const VISIBILITY_MILLIS: i64 = 300;

/// Time-to-live used by lifecycle tests
pub const TIME_TO_LIVE_MILLIS: i64 = 5_000;

/// Sleep long enough for a lease to lapse
#[allow(dead_code)]
pub async fn wait_past_visibility() {
    tokio::time::sleep(std::time::Duration::from_millis(
        (VISIBILITY_MILLIS + 200) as u64,
    ))
    .await;
}

/// Create an in-memory provider with scaled-down lease durations
#[allow(dead_code)]
pub fn create_provider(queue_name: &str) -> InMemoryQueueingProvider {
    create_provider_with(
        queue_name,
        Duration::milliseconds(VISIBILITY_MILLIS),
        Duration::milliseconds(TIME_TO_LIVE_MILLIS),
    )
}

/// Create an in-memory provider with explicit lease durations
#[allow(dead_code)]
pub fn create_provider_with(
    queue_name: &str,
    visibility_timeout: Duration,
    time_to_live: Duration,
) -> InMemoryQueueingProvider {
    let policy = LeasePolicy::new(visibility_timeout, time_to_live).expect("valid lease policy");
    InMemoryQueueingProvider::new(InMemoryConfig::new(queue_name, policy))
        .expect("provider should be created")
}
