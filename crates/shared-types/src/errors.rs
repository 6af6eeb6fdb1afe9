//! # Error Types
//!
//! The delivery error taxonomy shared by the polling channel and fan-out
//! subsystems. Partial fan-out failure is not an error: it is reported as an
//! aggregated response with [`ResponseStatusCode::MixedResponses`].

use thiserror::Error;

use crate::entities::{Originator, RequestId, ResourceId};
use crate::status::ResponseStatusCode;

/// Errors observable by callers of the delivery core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Originator lacks the required permission on the target.
    #[error("Permission denied: {originator} may not access {target}")]
    PermissionDenied {
        originator: Originator,
        target: ResourceId,
    },

    /// No queued request became available before the poll deadline.
    #[error("Timeout: nothing to deliver for {target} within {waited_ms}ms")]
    Timeout { target: ResourceId, waited_ms: u64 },

    /// No correlated response arrived before the submitter's deadline.
    #[error("Request timeout: no response for {request_id}")]
    RequestTimeout { request_id: RequestId },

    /// A response arrived from an identity other than the expected target.
    #[error("Originator mismatch for {request_id}: expected {expected}, got {actual}")]
    OriginatorMismatch {
        request_id: RequestId,
        expected: Originator,
        actual: Originator,
    },

    /// The target's mailbox is at capacity.
    #[error("Queue full: mailbox for {target} holds {capacity} requests")]
    QueueFull { target: ResourceId, capacity: usize },

    /// Nested fan-out exceeded the configured recursion limit.
    #[error("Fan-out too deep: depth {depth} exceeds limit {limit}")]
    FanOutTooDeep { depth: u8, limit: u8 },

    /// Target, group or correlated request does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A waiter with the same request identifier is already registered.
    #[error("Duplicate request identifier: {0}")]
    DuplicateRequestId(RequestId),

    /// The waiting party was released by cancellation.
    #[error("Cancelled: {request_id}")]
    Cancelled { request_id: RequestId },

    /// Normal dispatch failed for a reason outside the delivery core.
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl DeliveryError {
    /// Response status code reported to the caller for this failure.
    pub fn status_code(&self) -> ResponseStatusCode {
        match self {
            Self::PermissionDenied { .. } | Self::OriginatorMismatch { .. } => {
                ResponseStatusCode::OriginatorHasNoPrivilege
            }
            Self::Timeout { .. } | Self::RequestTimeout { .. } | Self::Cancelled { .. } => {
                ResponseStatusCode::RequestTimeout
            }
            Self::QueueFull { .. } => ResponseStatusCode::TargetNotReachable,
            Self::FanOutTooDeep { .. } => ResponseStatusCode::OperationNotAllowed,
            Self::NotFound(_) => ResponseStatusCode::NotFound,
            Self::DuplicateRequestId(_) => ResponseStatusCode::Conflict,
            Self::Dispatch(_) => ResponseStatusCode::InternalServerError,
        }
    }

    /// True for the two deadline-driven outcomes.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RequestTimeout { .. })
    }
}

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
