//! # Group Fan-Out Flows
//!
//! Group operations through the runtime, with members of every kind the
//! router knows: local content, non-reachable entities behind polling
//! channels, and nested groups.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    use cse_01_polling_channel::PollingChannelApi;
    use cse_02_group_fanout::{GroupFanOutApi, SlotStatus};
    use cse_runtime::{CseConfig, DeliveryContainer};
    use serde_json::{json, Value};
    use shared_types::{
        M2mRequest, M2mResponse, Operation, Originator, ResourceId, ResponseStatusCode,
    };

    use crate::integration::{admin, container_with, test_container};

    /// Polling submitters outlive the fan-out deadline, so a silent entity
    /// shows up as a timed-out slot rather than a failed one.
    fn patient_container() -> Arc<DeliveryContainer> {
        let mut config = CseConfig::for_testing();
        config.polling.default_response_wait_ms = 5_000;
        config.polling.request_ttl_ms = 10_000;
        container_with(config)
    }

    fn members(payload: &Value) -> &Vec<Value> {
        payload["members"].as_array().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_silent_member_gives_mixed_response() {
        let container = patient_container();
        container.directory.put_content("cse-in/a", json!({ "v": 1 }));
        container.directory.put_content("cse-in/b", json!({ "v": 2 }));
        container.register_entity("cse-in/sleepy", Originator::from("Csleepy"), false);
        container
            .directory
            .add_group("cse-in/grp", &["cse-in/a", "cse-in/sleepy", "cse-in/b"]);

        let started = Instant::now();
        let response = container
            .handle(M2mRequest::new(Operation::Retrieve, "cse-in/grp", admin()))
            .await;

        assert_eq!(response.status, ResponseStatusCode::MixedResponses);
        assert!(!response.status.is_success());
        assert!(!response.status.is_failure());
        assert!(started.elapsed() >= Duration::from_millis(1_000));

        let entries = members(&response.payload);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["member"], "cse-in/a");
        assert_eq!(entries[0]["rsc"], 2000);
        assert_eq!(entries[0]["pc"], json!({ "v": 1 }));
        assert_eq!(entries[1]["member"], "cse-in/sleepy");
        assert_eq!(entries[1]["rsc"], 4008);
        assert_eq!(entries[2]["pc"], json!({ "v": 2 }));

        // The abandoned polling submission cleaned up after itself.
        assert_eq!(container.polling.queue().mailbox_count(), 0);
        assert_eq!(container.polling.correlator().pending_count(), 0);
        assert_eq!(
            container.fanout.available_workers(),
            container.config.fanout.max_concurrent_dispatches
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_member_that_answers_completes() {
        let container = patient_container();
        container.directory.put_content("cse-in/a", json!("ok"));
        container.register_entity("cse-in/ae1", Originator::from("Cae1"), false);
        container
            .directory
            .add_group("cse-in/grp", &["cse-in/a", "cse-in/ae1"]);

        let entity = {
            let container = container.clone();
            tokio::spawn(async move {
                let polled = container
                    .polling
                    .handle_poll(&ResourceId::from("cse-in/ae1"), &Originator::from("Cae1"), None)
                    .await
                    .unwrap();
                container
                    .polling
                    .deliver_response(
                        M2mResponse::new(
                            polled.request_id,
                            ResponseStatusCode::Ok,
                            Originator::from("Cae1"),
                        )
                        .with_payload(json!("ok")),
                    )
                    .await
                    .unwrap();
            })
        };

        let aggregated = container
            .fanout
            .handle_group_operation(
                &ResourceId::from("cse-in/grp"),
                Operation::Retrieve,
                Value::Null,
                &admin(),
            )
            .await
            .unwrap();
        entity.await.unwrap();

        assert_eq!(aggregated.status, ResponseStatusCode::Ok);
        assert_eq!(aggregated.count(SlotStatus::Completed), 2);
        assert_eq!(aggregated.payload, json!(["ok", "ok"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nested_groups_past_the_limit_fail_only_that_branch() {
        // for_testing: max_depth = 2
        let container = test_container();
        container.directory.put_content("cse-in/leaf", json!("leaf"));
        container.directory.put_content("cse-in/sibling", json!("sibling"));
        container.directory.add_group("cse-in/g3", &["cse-in/leaf"]);
        container.directory.add_group("cse-in/g2", &["cse-in/g3"]);
        container.directory.add_group("cse-in/g1", &["cse-in/g2"]);
        container
            .directory
            .add_group("cse-in/g0", &["cse-in/g1", "cse-in/sibling"]);

        let response = container
            .handle(M2mRequest::new(Operation::Retrieve, "cse-in/g0", admin()))
            .await;

        assert_eq!(response.status, ResponseStatusCode::MixedResponses);
        let entries = members(&response.payload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["member"], "cse-in/g1");
        assert_eq!(entries[0]["rsc"], ResponseStatusCode::MixedResponses.code());
        assert_eq!(entries[1]["member"], "cse-in/sibling");
        assert_eq!(entries[1]["pc"], "sibling");

        let stats = container.fanout.stats();
        assert_eq!(
            stats
                .total_rejected_too_deep
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_self_referencing_fanout_point_stops_at_the_limit() {
        let container = test_container();
        container.directory.add_group("cse-in/g", &["cse-in/g/fopt"]);

        let started = Instant::now();
        let response = container
            .handle(M2mRequest::new(Operation::Retrieve, "cse-in/g", admin()))
            .await;

        assert_eq!(response.status, ResponseStatusCode::MixedResponses);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            container
                .fanout
                .stats()
                .total_rejected_too_deep
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_fanout_point_tail_reaches_member_children() {
        let container = test_container();
        for member in ["cse-in/a", "cse-in/b"] {
            container.directory.put_content(member, Value::Null);
            container
                .directory
                .put_content(format!("{member}/cfg"), json!({ "mode": "eco" }));
        }
        container
            .directory
            .add_group("cse-in/grp", &["cse-in/a", "cse-in/b"]);

        let aggregated = container
            .fanout
            .handle_group_operation(
                &ResourceId::from("cse-in/grp/fopt/cfg"),
                Operation::Update,
                json!({ "mode": "boost" }),
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(aggregated.status, ResponseStatusCode::Updated);
        assert_eq!(aggregated.payload, json!({ "mode": "boost" }));
        for member in ["cse-in/a/cfg", "cse-in/b/cfg"] {
            let response = container
                .handle(M2mRequest::new(Operation::Retrieve, member, admin()))
                .await;
            assert_eq!(response.payload, json!({ "mode": "boost" }));
        }
    }

    #[tokio::test]
    async fn test_create_through_group_reports_per_member() {
        let container = test_container();
        container.directory.put_content("cse-in/a", Value::Null);
        container.directory.put_content("cse-in/b", Value::Null);
        container.directory.put_content("cse-in/b/cin", Value::Null);
        container
            .directory
            .add_group("cse-in/grp", &["cse-in/a", "cse-in/b"]);

        let aggregated = container
            .fanout
            .handle_group_operation(
                &ResourceId::from("cse-in/grp/fopt"),
                Operation::Create,
                json!({ "rn": "cin" }),
                &admin(),
            )
            .await
            .unwrap();

        assert!(aggregated.is_mixed());
        assert_eq!(aggregated.count(SlotStatus::Completed), 1);
        assert_eq!(aggregated.count(SlotStatus::Failed), 1);
        let entries = members(&aggregated.payload);
        assert_eq!(entries[0]["created"], true);
        assert_eq!(entries[1]["created"], false);
    }

    #[tokio::test]
    async fn test_group_permission_checked_before_members() {
        let container = test_container();
        container.directory.put_content("cse-in/a", Value::Null);
        container.directory.add_group("cse-in/grp", &["cse-in/a"]);

        let response = container
            .handle(M2mRequest::new(
                Operation::Retrieve,
                "cse-in/grp",
                Originator::from("Coutsider"),
            ))
            .await;
        assert_eq!(response.status, ResponseStatusCode::OriginatorHasNoPrivilege);
        assert_eq!(
            container
                .fanout
                .stats()
                .total_jobs
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let container = test_container();
        let response = container
            .handle(M2mRequest::new(Operation::Retrieve, "cse-in/nogroup/fopt", admin()))
            .await;
        assert_eq!(response.status, ResponseStatusCode::NotFound);
    }
}
