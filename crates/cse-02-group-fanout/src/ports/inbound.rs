//! Driving ports (Inbound API)

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{DeliveryResult, M2mRequest, Operation, Originator, ResourceId};

use crate::domain::AggregatedResponse;

/// Primary Group Fan-Out API
#[async_trait]
pub trait GroupFanOutApi: Send + Sync {
    /// Apply `operation` to every member of the group at `address`.
    ///
    /// `address` is a group or its fan-out point (`<group>/fopt[/<tail>]`).
    /// Member failures and timeouts are reported inside the aggregated
    /// response, not as errors.
    ///
    /// # Errors
    /// - `PermissionDenied`: `originator` lacks the operation's permission on the group
    /// - `NotFound`: the group does not resolve or has no members
    async fn handle_group_operation(
        &self,
        address: &ResourceId,
        operation: Operation,
        payload: Value,
        originator: &Originator,
    ) -> DeliveryResult<AggregatedResponse>;

    /// Same as `handle_group_operation`, keeping the caller's request ID as
    /// the job's parent ID.
    async fn handle_group_request(&self, request: M2mRequest) -> DeliveryResult<AggregatedResponse>;
}
