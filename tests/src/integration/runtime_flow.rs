//! # Runtime Flows
//!
//! Configuration through to a running container, and isolation between
//! containers living in one process.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use cse_01_polling_channel::PollingChannelApi;
    use cse_runtime::{ConfigError, CseConfig, DeliveryContainer};
    use serde_json::json;
    use shared_types::{M2mRequest, Operation, Originator, ResourceId, ResponseStatusCode};

    use crate::integration::{admin, container_with, test_container};

    #[test]
    fn test_file_then_env_drives_services() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "cse_id": "CSE-file", "polling": {{ "mailbox_capacity": 2 }}, "fanout": {{ "max_depth": 5 }} }}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = CseConfig::load_with(|key| match key {
            "CSE_CONFIG" => Some(path.clone()),
            "CSE_FANOUT_WORKERS" => Some("3".to_string()),
            _ => None,
        })
        .unwrap();

        let container = DeliveryContainer::new(config);
        assert_eq!(container.router.cse_id().as_str(), "CSE-file");
        assert_eq!(container.polling.queue().capacity(), 2);
        assert_eq!(container.fanout.config().max_depth, 5);
        assert_eq!(container.fanout.available_workers(), 3);
    }

    #[test]
    fn test_unusable_settings_are_rejected() {
        let err = CseConfig::load_with(|key| {
            (key == "CSE_MAILBOX_CAPACITY").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "polling.mailbox_capacity"));

        let err = CseConfig::load_with(|key| {
            (key == "CSE_FANOUT_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "CSE_FANOUT_TIMEOUT_MS", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_containers_do_not_share_state() {
        let first = test_container();
        let second = test_container();
        for container in [&first, &second] {
            container.register_entity("cse-in/ae1", Originator::from("Cae1"), false);
        }

        let submitter = first.clone();
        let pending = tokio::spawn(async move {
            submitter
                .handle(M2mRequest::new(Operation::Notify, "cse-in/ae1", admin()))
                .await
        });
        let target = ResourceId::from("cse-in/ae1");
        while first.polling.queue().len(&target) == 0 {
            tokio::task::yield_now().await;
        }

        // Same address, other container: nothing queued there.
        let err = second
            .polling
            .handle_poll(&ResourceId::from("cse-in/ae1"), &Originator::from("Cae1"), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        assert_eq!(pending.await.unwrap().status, ResponseStatusCode::RequestTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_clears_expired_entries_while_running() {
        let mut config = CseConfig::for_testing();
        config.polling.default_response_wait_ms = 5_000;
        config.polling.request_ttl_ms = 100;
        let container = container_with(config);
        container.register_entity("cse-in/ae1", Originator::from("Cae1"), false);
        container.start_background_tasks();

        let submitter = container.clone();
        let pending = tokio::spawn(async move {
            submitter
                .handle(
                    M2mRequest::new(Operation::Notify, "cse-in/ae1", admin())
                        .with_request_id("req-sweep".into()),
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(container.polling.queue().len(&ResourceId::from("cse-in/ae1")), 0);
        assert!(container.polling.queue().stats().total_expired.load(Ordering::Relaxed) >= 1);

        assert!(container.polling.cancel(&"req-sweep".into()).await);
        let response = pending.await.unwrap();
        assert_eq!(response.status, ResponseStatusCode::RequestTimeout);
        assert_eq!(container.polling.correlator().pending_count(), 0);

        container.shutdown().await;
        assert_eq!(container.background_tasks(), 0);
    }

    #[tokio::test]
    async fn test_local_resources_round_trip() {
        let container = test_container();

        let created = container
            .handle(
                M2mRequest::new(Operation::Create, "cse-in", admin())
                    .with_payload(json!({ "rn": "box", "con": "1" })),
            )
            .await;
        assert_eq!(created.status, ResponseStatusCode::Created);
        assert_eq!(created.payload["ri"], "cse-in/box");

        let deleted = container
            .handle(M2mRequest::new(Operation::Delete, "cse-in/box", admin()))
            .await;
        assert_eq!(deleted.status, ResponseStatusCode::Deleted);

        let missing = container
            .handle(M2mRequest::new(Operation::Retrieve, "cse-in/box", admin()))
            .await;
        assert_eq!(missing.status, ResponseStatusCode::NotFound);
    }
}
