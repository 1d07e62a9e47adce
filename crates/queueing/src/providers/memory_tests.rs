//! Tests for in-memory queue provider.

use super::*;
use crate::provider::DEFAULT_IN_MEMORY_MAX_MESSAGE_SIZE;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

fn create_store() -> InMemoryQueueStore {
    InMemoryQueueStore {
        queue_name: QueueName::new("test-queue".to_string()).unwrap(),
        storage: Arc::new(RwLock::new(QueueStorage::default())),
        max_message_size: DEFAULT_IN_MEMORY_MAX_MESSAGE_SIZE,
    }
}

fn create_provider(visibility_millis: i64, ttl_millis: i64) -> InMemoryQueueingProvider {
    let policy = LeasePolicy::new(
        Duration::milliseconds(visibility_millis),
        Duration::milliseconds(ttl_millis),
    )
    .unwrap();

    InMemoryQueueingProvider::new(InMemoryConfig::new("test-queue", policy)).unwrap()
}

// ============================================================================
// Provider Construction Tests
// ============================================================================

mod provider_construction {
    use super::*;

    /// Verify that the provider reports its configuration.
    #[test]
    fn test_create_provider_with_default_policy() {
        let provider = InMemoryQueueingProvider::new(InMemoryConfig::new(
            "orders",
            LeasePolicy::default(),
        ))
        .unwrap();

        assert_eq!(provider.provider_type(), ProviderType::InMemory);
        assert_eq!(provider.queue_name().as_str(), "orders");
        assert_eq!(provider.policy(), LeasePolicy::default());
        assert_eq!(provider.approximate_message_count().unwrap(), 0);
    }

    /// Verify that an invalid queue name is rejected at construction.
    #[test]
    fn test_invalid_queue_name_rejected() {
        let result =
            InMemoryQueueingProvider::new(InMemoryConfig::new("Bad_Name", LeasePolicy::default()));

        assert!(matches!(result, Err(QueueError::InvalidArgument { .. })));
    }

    /// Verify that a negative duration smuggled into the config is rejected.
    #[test]
    fn test_negative_policy_rejected() {
        let mut config = InMemoryConfig::new("orders", LeasePolicy::default());
        config.policy.time_to_live = Duration::seconds(-5);

        let result = InMemoryQueueingProvider::new(config);

        assert!(matches!(
            result,
            Err(QueueError::InvalidArgument { ref field, .. }) if field == "time_to_live"
        ));
    }

    /// Verify that clients of one provider share a queue.
    #[tokio::test]
    async fn test_clients_share_queue() {
        let provider = create_provider(30_000, 60_000);
        let sender = provider.create_client();
        let receiver = provider.create_client();
        let cancel = CancellationToken::new();

        sender.send_text("shared", &cancel).await.unwrap();
        let message = receiver.try_receive_message(&cancel).await.unwrap();

        assert_eq!(message.unwrap().body_text().unwrap(), "shared");
    }

    /// Verify that separate providers do not share storage.
    #[tokio::test]
    async fn test_providers_are_independent() {
        let first = create_provider(30_000, 60_000);
        let second = create_provider(30_000, 60_000);
        let cancel = CancellationToken::new();

        first.create_client().send_text("one", &cancel).await.unwrap();

        assert_eq!(first.approximate_message_count().unwrap(), 1);
        assert_eq!(second.approximate_message_count().unwrap(), 0);
    }

    /// Verify that a poisoned queue lock is reported instead of an empty count.
    #[test]
    fn test_message_count_reports_poisoned_lock() {
        let provider = create_provider(30_000, 60_000);
        let storage = Arc::clone(&provider.storage);
        let _ = std::thread::spawn(move || {
            let _guard = storage.write().unwrap();
            panic!("holder of the queue lock failed");
        })
        .join();

        let result = provider.approximate_message_count();

        assert!(matches!(result, Err(QueueError::Transport { .. })));
    }
}

// ============================================================================
// Store Primitive Tests
// ============================================================================

mod store_primitives {
    use super::*;

    /// Verify that receive hides the message and increments the dequeue count.
    #[tokio::test]
    async fn test_receive_leases_message() {
        let store = create_store();
        store
            .enqueue(Bytes::from("payload"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();

        let leased = store.receive(Duration::minutes(1)).await.unwrap().unwrap();
        assert_eq!(leased.body, Bytes::from("payload"));
        assert_eq!(leased.dequeue_count, 1);
        assert!(leased.expires_at.is_some());

        let second = store.receive(Duration::minutes(1)).await.unwrap();
        assert!(second.is_none());
    }

    /// Verify that messages are handed out oldest first.
    #[tokio::test]
    async fn test_receive_in_insertion_order() {
        let store = create_store();
        for body in ["first", "second", "third"] {
            store
                .enqueue(Bytes::from(body), Duration::zero(), Duration::minutes(5))
                .await
                .unwrap();
        }

        let mut bodies = Vec::new();
        while let Some(leased) = store.receive(Duration::minutes(1)).await.unwrap() {
            bodies.push(leased.body);
        }

        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    /// Verify that an initial delay keeps the message invisible.
    #[tokio::test]
    async fn test_initial_delay_hides_message() {
        let store = create_store();
        store
            .enqueue(Bytes::from("later"), Duration::minutes(1), Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.receive(Duration::seconds(30)).await.unwrap().is_none());
    }

    /// Verify that deleting with the current token removes the message.
    #[tokio::test]
    async fn test_delete_with_current_token() {
        let store = create_store();
        store
            .enqueue(Bytes::from("x"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();
        let leased = store.receive(Duration::minutes(1)).await.unwrap().unwrap();

        store
            .delete_leased_message(&leased.message_id, &leased.lease_token)
            .await
            .unwrap();

        assert!(store.storage.read().unwrap().messages.is_empty());
    }

    /// Verify that deleting an unknown message reports 404.
    #[tokio::test]
    async fn test_delete_unknown_message_is_not_found() {
        let store = create_store();

        let error = store
            .delete_leased_message(&MessageId::new(), &LeaseToken::generate())
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::Status { status: 404, ref code, .. } if code == "MessageNotFound"));
        assert!(error.is_lease_gone());
    }

    /// Verify that a wrong token reports 400.
    #[tokio::test]
    async fn test_delete_with_wrong_token_is_bad_request() {
        let store = create_store();
        store
            .enqueue(Bytes::from("x"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();
        let leased = store.receive(Duration::minutes(1)).await.unwrap().unwrap();

        let error = store
            .delete_leased_message(&leased.message_id, &LeaseToken::generate())
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::Status { status: 400, ref code, .. } if code == "PopReceiptMismatch"));
    }

    /// Verify that releasing early makes the message visible and rotates the token.
    #[tokio::test]
    async fn test_release_rotates_token() {
        let store = create_store();
        store
            .enqueue(Bytes::from("x"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();
        let leased = store.receive(Duration::minutes(1)).await.unwrap().unwrap();

        store
            .release_lease_early(&leased.message_id, &leased.lease_token)
            .await
            .unwrap();

        // The old token no longer addresses the message
        let error = store
            .delete_leased_message(&leased.message_id, &leased.lease_token)
            .await
            .unwrap_err();
        assert!(error.is_lease_gone());

        let again = store.receive(Duration::minutes(1)).await.unwrap().unwrap();
        assert_eq!(again.message_id, leased.message_id);
        assert_eq!(again.dequeue_count, 2);
        assert_ne!(again.lease_token, leased.lease_token);
    }

    /// Verify that an oversized body is rejected with 413.
    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut store = create_store();
        store.max_message_size = 4;

        let error = store
            .enqueue(Bytes::from("too large"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap_err();

        assert!(matches!(error, StoreError::Status { status: 413, .. }));
    }

    /// Verify that visibility timeouts outside the accepted range are rejected.
    #[tokio::test]
    async fn test_visibility_out_of_range_rejected() {
        let store = create_store();

        let too_long = store.receive(Duration::days(8)).await.unwrap_err();
        assert!(matches!(too_long, StoreError::Status { status: 400, ref code, .. } if code == "OutOfRangeQueryParameterValue"));

        let negative = store.receive(Duration::seconds(-1)).await.unwrap_err();
        assert!(matches!(negative, StoreError::Status { status: 400, .. }));

        let zero = store.receive(Duration::zero()).await.unwrap_err();
        assert!(matches!(zero, StoreError::Status { status: 400, .. }));
    }

    /// Verify that sub-second visibility timeouts are honoured.
    #[tokio::test]
    async fn test_sub_second_visibility_accepted() {
        let store = create_store();
        store
            .enqueue(Bytes::from("x"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();

        let leased = store.receive(Duration::milliseconds(300)).await.unwrap();

        assert!(leased.is_some());
    }
}

// ============================================================================
// Expiry Tests
// ============================================================================

mod expiry {
    use super::*;

    /// Verify that an expired message is never delivered.
    #[tokio::test]
    async fn test_expired_message_not_delivered() {
        let store = create_store();
        store
            .enqueue(Bytes::from("short"), Duration::zero(), Duration::milliseconds(50))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(100)).await;

        assert!(store.receive(Duration::seconds(30)).await.unwrap().is_none());
        assert!(store.storage.read().unwrap().messages.is_empty());
    }

    /// Verify that committing an expired message reports 404.
    #[tokio::test]
    async fn test_commit_after_expiry_is_not_found() {
        let store = create_store();
        store
            .enqueue(Bytes::from("short"), Duration::zero(), Duration::milliseconds(100))
            .await
            .unwrap();
        let leased = store.receive(Duration::seconds(30)).await.unwrap().unwrap();

        tokio::time::sleep(StdDuration::from_millis(150)).await;

        let error = store
            .delete_leased_message(&leased.message_id, &leased.lease_token)
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Status { status: 404, .. }));
    }

    /// Verify that a zero time-to-live keeps the message indefinitely.
    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = create_store();
        store
            .enqueue(Bytes::from("forever"), Duration::zero(), Duration::zero())
            .await
            .unwrap();

        let leased = store.receive(Duration::seconds(30)).await.unwrap().unwrap();
        assert!(leased.expires_at.is_none());
    }

    /// Verify that a time-to-live past the end of representable time never expires.
    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let provider = create_provider(30_000, 1_000_000_000 * 86_400_000);
        let client = provider.create_client();
        let cancel = CancellationToken::new();

        client.send_text("x", &cancel).await.unwrap();
        let message = client.try_receive_message(&cancel).await.unwrap().unwrap();

        assert!(message.expires_at().is_none());
        assert_eq!(message.body_text().unwrap(), "x");
    }

    /// Verify that a lease that lapses makes the message visible again.
    #[tokio::test]
    async fn test_lapsed_lease_redelivers() {
        let store = create_store();
        store
            .enqueue(Bytes::from("x"), Duration::zero(), Duration::minutes(5))
            .await
            .unwrap();
        let first = store.receive(Duration::milliseconds(50)).await.unwrap().unwrap();

        tokio::time::sleep(StdDuration::from_millis(100)).await;

        let second = store.receive(Duration::minutes(1)).await.unwrap().unwrap();
        assert_eq!(second.message_id, first.message_id);
        assert_eq!(second.dequeue_count, 2);

        // The first lease was superseded by the redelivery
        let error = store
            .delete_leased_message(&first.message_id, &first.lease_token)
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Status { status: 400, .. }));
    }
}

// ============================================================================
// Concurrent Access Tests
// ============================================================================

mod concurrent_access {
    use super::*;

    /// Verify that concurrent receivers never lease the same message twice.
    #[tokio::test]
    async fn test_concurrent_receivers_get_distinct_messages() {
        let provider = Arc::new(create_provider(30_000, 60_000));
        let cancel = CancellationToken::new();
        let client = provider.create_client();
        for i in 0..20 {
            client.send_text(&format!("m{}", i), &cancel).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let provider = Arc::clone(&provider);
            handles.push(tokio::spawn(async move {
                let client = provider.create_client();
                let cancel = CancellationToken::new();
                let mut ids = Vec::new();
                while let Some(message) = client.try_receive_message(&cancel).await.unwrap() {
                    ids.push(message.message_id().clone());
                }
                ids
            }));
        }

        let mut all_ids = Vec::new();
        for handle in handles {
            all_ids.extend(handle.await.unwrap());
        }

        let unique: std::collections::HashSet<_> = all_ids.iter().cloned().collect();
        assert_eq!(all_ids.len(), 20);
        assert_eq!(unique.len(), 20);
    }
}
