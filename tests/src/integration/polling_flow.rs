//! # Polling Channel Flows
//!
//! A requester sends to a non-reachable entity through the runtime router;
//! the entity long-polls its channel, answers out-of-band, and the requester
//! gets the answer.
//!
//! ```text
//! requester ──handle──→ CseRouter ──submit_async──→ RequestQueue ──handle_poll──→ entity
//!     ↑                                                                          │
//!     └────────────── ResponseCorrelator ←──────deliver_response─────────────────┘
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    use cse_01_polling_channel::PollingChannelApi;
    use cse_runtime::{CseConfig, DeliveryContainer};
    use shared_types::{
        M2mRequest, M2mResponse, Operation, Originator, ResourceId, ResponseStatusCode,
    };

    use crate::integration::{admin, container_with, test_container};

    const AE: &str = "cse-in/ae1";

    fn entity() -> Originator {
        Originator::from("Cae1")
    }

    fn with_entity(container: Arc<DeliveryContainer>) -> Arc<DeliveryContainer> {
        container.register_entity(AE, entity(), false);
        container
    }

    async fn wait_for_queued(container: &DeliveryContainer, count: usize) {
        let target = ResourceId::from(AE);
        while container.polling.queue().len(&target) < count {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_request(
        container: &Arc<DeliveryContainer>,
        request: M2mRequest,
    ) -> tokio::task::JoinHandle<M2mResponse> {
        let container = container.clone();
        tokio::spawn(async move { container.handle(request).await })
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_reach_entity_in_submission_order() {
        let container = with_entity(test_container());

        let first = M2mRequest::new(Operation::Notify, AE, admin()).with_payload("one".into());
        let second = M2mRequest::new(Operation::Notify, AE, admin()).with_payload("two".into());
        let first_id = first.request_id.clone();
        let second_id = second.request_id.clone();

        let a = spawn_request(&container, first);
        wait_for_queued(&container, 1).await;
        let b = spawn_request(&container, second);
        wait_for_queued(&container, 2).await;

        for expected in [&first_id, &second_id] {
            let polled = container
                .polling
                .handle_poll(&ResourceId::from(AE), &entity(), None)
                .await
                .unwrap();
            assert_eq!(&polled.request_id, expected);
            container
                .polling
                .deliver_response(M2mResponse::new(
                    polled.request_id,
                    ResponseStatusCode::Ok,
                    entity(),
                ))
                .await
                .unwrap();
        }

        assert_eq!(a.await.unwrap().request_id, first_id);
        assert_eq!(b.await.unwrap().request_id, second_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_at_two_seconds_releases_five_second_wait() {
        let mut config = CseConfig::for_testing();
        config.polling.default_response_wait_ms = 5_000;
        config.polling.request_ttl_ms = 10_000;
        let container = with_entity(container_with(config));

        let started = Instant::now();
        let submit = spawn_request(
            &container,
            M2mRequest::new(Operation::Retrieve, format!("{AE}/state"), admin()),
        );

        let polled = container
            .polling
            .handle_poll(&ResourceId::from(AE), &entity(), None)
            .await
            .unwrap();
        assert_eq!(polled.to.as_str(), "cse-in/ae1/state");
        assert_eq!(polled.from, admin());

        tokio::time::sleep(Duration::from_secs(2)).await;
        container
            .polling
            .deliver_response(
                M2mResponse::new(polled.request_id, ResponseStatusCode::Ok, entity())
                    .with_payload(serde_json::json!({ "temp": 21 })),
            )
            .await
            .unwrap();

        let response = submit.await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(response.status, ResponseStatusCode::Ok);
        assert_eq!(response.payload["temp"], 21);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_impostor_response_does_not_release_submitter() {
        let container = with_entity(test_container());
        let submit = spawn_request(&container, M2mRequest::new(Operation::Notify, AE, admin()));

        let polled = container
            .polling
            .handle_poll(&ResourceId::from(AE), &entity(), None)
            .await
            .unwrap();

        let err = container
            .polling
            .deliver_response(M2mResponse::new(
                polled.request_id.clone(),
                ResponseStatusCode::Ok,
                Originator::from("Cimpostor"),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), ResponseStatusCode::OriginatorHasNoPrivilege);
        assert!(container.polling.correlator().is_pending(&polled.request_id));

        container
            .polling
            .deliver_response(M2mResponse::new(
                polled.request_id,
                ResponseStatusCode::Ok,
                entity(),
            ))
            .await
            .unwrap();
        assert_eq!(submit.await.unwrap().from, entity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_entity_times_out_without_leftovers() {
        let container = with_entity(test_container());

        let response = container
            .handle(M2mRequest::new(Operation::Notify, AE, admin()))
            .await;
        assert_eq!(response.status, ResponseStatusCode::RequestTimeout);
        assert_eq!(container.polling.queue().mailbox_count(), 0);
        assert_eq!(container.polling.correlator().pending_count(), 0);

        // Nothing left for a late poller either.
        let started = Instant::now();
        let err = container
            .polling
            .handle_poll(&ResourceId::from(AE), &entity(), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(container.polling.queue().mailbox_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_request_is_never_queued() {
        let container = with_entity(test_container());

        let response = container
            .handle(M2mRequest::new(Operation::Notify, AE, admin()).with_expiration(Duration::ZERO))
            .await;
        assert_eq!(response.status, ResponseStatusCode::RequestTimeout);
        assert_eq!(
            container
                .polling
                .queue()
                .stats()
                .total_enqueued
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_originator_cannot_drain_channel() {
        let container = with_entity(test_container());
        let started = Instant::now();

        let err = container
            .polling
            .handle_poll(&ResourceId::from(AE), &Originator::from("Cnosy"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), ResponseStatusCode::OriginatorHasNoPrivilege);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_entities_are_served_independently() {
        let container = test_container();
        let entities: Vec<(String, Originator)> = (0..8)
            .map(|i| (format!("cse-in/ae{i}"), Originator::new(format!("Cae{i}"))))
            .collect();
        for (id, originator) in &entities {
            container.register_entity(id.as_str(), originator.clone(), false);
        }

        // Each entity answers one request, echoing its own name.
        let pollers: Vec<_> = entities
            .iter()
            .cloned()
            .map(|(id, originator)| {
                let container = container.clone();
                tokio::spawn(async move {
                    let polled = container
                        .polling
                        .handle_poll(&ResourceId::from(id.as_str()), &originator, None)
                        .await
                        .unwrap();
                    container
                        .polling
                        .deliver_response(
                            M2mResponse::new(polled.request_id, ResponseStatusCode::Ok, originator)
                                .with_payload(id.into()),
                        )
                        .await
                        .unwrap();
                })
            })
            .collect();

        let requests: Vec<_> = entities
            .iter()
            .map(|(id, _)| {
                spawn_request(
                    &container,
                    M2mRequest::new(Operation::Retrieve, id.as_str(), admin()),
                )
            })
            .collect();

        for ((id, originator), request) in entities.iter().zip(requests) {
            let response = request.await.unwrap();
            assert_eq!(response.status, ResponseStatusCode::Ok);
            assert_eq!(&response.from, originator);
            assert_eq!(response.payload, serde_json::Value::from(id.as_str()));
        }
        for poller in pollers {
            poller.await.unwrap();
        }
        assert_eq!(container.polling.correlator().pending_count(), 0);
    }
}
