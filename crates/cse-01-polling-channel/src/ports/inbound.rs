//! Driving ports (Inbound API)
//!
//! | Method | Caller |
//! |--------|--------|
//! | `handle_poll` | the non-reachable entity, retrieving its queued requests |
//! | `deliver_response` | the non-reachable entity, answering a retrieved request |
//! | `submit_async` | the request router, for targets it cannot reach directly |
//! | `cancel` | the request router, when the submitter's connection goes away |

use async_trait::async_trait;
use shared_types::{DeliveryResult, M2mRequest, M2mResponse, Originator, RequestId, ResourceId};
use std::time::Duration;

use crate::domain::{ChannelTarget, QueuedNotification};

/// Primary Polling Channel API
#[async_trait]
pub trait PollingChannelApi: Send + Sync {
    /// Retrieve the oldest queued request for `target`, waiting for one if
    /// the mailbox is empty.
    ///
    /// `max_wait` may shorten the configured ceiling, never extend it.
    ///
    /// # Errors
    /// - `PermissionDenied`: `originator` lacks NOTIFY on `target` (no wait)
    /// - `Timeout`: nothing arrived in time
    async fn handle_poll(
        &self,
        target: &ResourceId,
        originator: &Originator,
        max_wait: Option<Duration>,
    ) -> DeliveryResult<QueuedNotification>;

    /// Queue `request` for `target` and wait for the correlated response.
    ///
    /// # Errors
    /// - `RequestTimeout`: no response from the target in time, or the
    ///   request had already expired on arrival
    /// - `QueueFull`: the target's mailbox is at capacity
    /// - `DuplicateRequestId`: a submission with this request ID is in flight
    /// - `Cancelled`: released by `cancel`
    async fn submit_async(
        &self,
        target: &ChannelTarget,
        request: M2mRequest,
        max_wait: Option<Duration>,
    ) -> DeliveryResult<M2mResponse>;

    /// Hand a response from the polling entity to the parked submitter.
    ///
    /// # Errors
    /// - `OriginatorMismatch`: `response.from` is not the queued target
    /// - `NotFound`: nobody is waiting for this request
    async fn deliver_response(&self, response: M2mResponse) -> DeliveryResult<()>;

    /// Release a parked submitter and drop its queued request.
    async fn cancel(&self, request_id: &RequestId) -> bool;
}
