//! Polling channel domain entities.

use serde::Serialize;
use shared_types::{
    M2mRequest, M2mResponse, Operation, Originator, RequestId, ResourceId, ResponseStatusCode,
};
use tokio::time::Instant;

/// The non-reachable entity a request is parked for.
///
/// `resource_id` keys the mailbox; `originator` is the only identity allowed
/// to answer requests queued there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub resource_id: ResourceId,
    pub originator: Originator,
}

impl ChannelTarget {
    pub fn new(resource_id: impl Into<ResourceId>, originator: Originator) -> Self {
        Self {
            resource_id: resource_id.into(),
            originator,
        }
    }
}

/// A request waiting in a target's mailbox.
///
/// Owned by the queue from enqueue until it is delivered or found expired.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request_id: RequestId,
    /// Identity expected to answer.
    pub target_originator: Originator,
    /// Identity that submitted the request.
    pub requester: Originator,
    pub operation: Operation,
    pub to: ResourceId,
    pub payload: serde_json::Value,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl PendingRequest {
    pub fn from_request(
        request: M2mRequest,
        target_originator: Originator,
        created_at: Instant,
        expires_at: Instant,
    ) -> Self {
        Self {
            request_id: request.request_id,
            target_originator,
            requester: request.from,
            operation: request.operation,
            to: request.to,
            payload: request.payload,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// What a poller receives: the queued request wrapped as a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedNotification {
    pub request_id: RequestId,
    pub operation: Operation,
    pub to: ResourceId,
    /// Original requester, so the poller knows who is asking.
    pub from: Originator,
    pub payload: serde_json::Value,
    /// Set when the originating operation was a create.
    #[serde(rename = "vrq", skip_serializing_if = "std::ops::Not::not")]
    pub verification_request: bool,
    /// Set when the originating operation was a delete.
    #[serde(rename = "sud", skip_serializing_if = "std::ops::Not::not")]
    pub subscription_deletion: bool,
    /// Time left before the queued request would have expired.
    pub remaining_ms: u64,
}

impl QueuedNotification {
    pub fn from_pending(pending: PendingRequest, now: Instant) -> Self {
        let remaining_ms = pending.expires_at.saturating_duration_since(now).as_millis() as u64;
        Self {
            verification_request: pending.operation == Operation::Create,
            subscription_deletion: pending.operation == Operation::Delete,
            request_id: pending.request_id,
            operation: pending.operation,
            to: pending.to,
            from: pending.requester,
            payload: pending.payload,
            remaining_ms,
        }
    }
}

/// A response returned out-of-band by the polling entity, consumed exactly
/// once by the matching submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    pub request_id: RequestId,
    pub status: ResponseStatusCode,
    pub payload: serde_json::Value,
    pub received_at: Instant,
}

impl PendingResponse {
    pub fn from_response(response: M2mResponse, received_at: Instant) -> Self {
        Self {
            request_id: response.request_id,
            status: response.status,
            payload: response.payload,
            received_at,
        }
    }

    /// Re-wraps the response for the submitter, stamped with the answering identity.
    pub fn into_response(self, from: Originator) -> M2mResponse {
        M2mResponse::new(self.request_id, self.status, from).with_payload(self.payload)
    }
}

/// Per-poll state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Waiting,
    Delivered,
    TimedOut,
    Unauthorized,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::TimedOut | Self::Unauthorized)
    }

    /// Valid transitions:
    /// - Idle -> Waiting | Unauthorized
    /// - Waiting -> Delivered | TimedOut
    pub fn can_transition_to(self, next: PollState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Waiting)
                | (Self::Idle, Self::Unauthorized)
                | (Self::Waiting, Self::Delivered)
                | (Self::Waiting, Self::TimedOut)
        )
    }
}

/// Tracks one poll call through its state machine.
#[derive(Debug)]
pub struct PollSession {
    pub target: ResourceId,
    pub originator: Originator,
    state: PollState,
    started_at: Instant,
}

impl PollSession {
    pub fn new(target: ResourceId, originator: Originator) -> Self {
        Self {
            target,
            originator,
            state: PollState::Idle,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Moves to `next`. Invalid transitions leave the state untouched.
    pub fn advance(&mut self, next: PollState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
