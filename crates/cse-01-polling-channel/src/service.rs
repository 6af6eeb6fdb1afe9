//! Polling Channel Service - wires the queue and correlator behind the
//! access check and exposes `PollingChannelApi`.

use async_trait::async_trait;
use shared_types::{
    AccessControlGate, DeliveryError, DeliveryResult, M2mRequest, M2mResponse, Originator,
    Permission, RequestId, ResourceId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{
    ChannelTarget, PendingRequest, PollSession, PollState, PollingConfig, QueuedNotification,
    RequestQueue, ResponseCorrelator,
};
use crate::ports::PollingChannelApi;

/// Polling channel service.
///
/// One instance per CSE; construct it explicitly and share it behind an `Arc`.
pub struct PollingChannelService {
    queue: RequestQueue,
    correlator: ResponseCorrelator,
    access: Arc<dyn AccessControlGate>,
    config: PollingConfig,
}

/// Withdraws a submitted request from its mailbox when the submitter leaves,
/// whether by response, timeout, cancellation or being dropped.
struct QueuedEntry<'a> {
    queue: &'a RequestQueue,
    target: &'a ResourceId,
    request_id: RequestId,
}

impl Drop for QueuedEntry<'_> {
    fn drop(&mut self) {
        self.queue.withdraw(self.target, &self.request_id);
    }
}

impl PollingChannelService {
    pub fn new(config: PollingConfig, access: Arc<dyn AccessControlGate>) -> Self {
        Self {
            queue: RequestQueue::new(config.mailbox_capacity),
            correlator: ResponseCorrelator::new(),
            access,
            config,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn correlator(&self) -> &ResponseCorrelator {
        &self.correlator
    }

    /// Sweep expired queue entries and stale waiters.
    ///
    /// Returns `(entries_removed, waiters_removed)`.
    pub fn purge_expired(&self) -> (usize, usize) {
        (self.queue.purge_expired(), self.correlator.remove_stale())
    }

    /// Mailbox lifetime for a new submission: the shortest of the configured
    /// TTL, the submitter's wait and the request's own expiration.
    fn entry_lifetime(&self, request: &M2mRequest, wait: Duration) -> Duration {
        let lifetime = self.config.request_ttl().min(wait);
        request
            .expires_in()
            .map_or(lifetime, |expires_in| lifetime.min(expires_in))
    }
}

#[async_trait]
impl PollingChannelApi for PollingChannelService {
    async fn handle_poll(
        &self,
        target: &ResourceId,
        originator: &Originator,
        max_wait: Option<Duration>,
    ) -> DeliveryResult<QueuedNotification> {
        let mut session = PollSession::new(target.clone(), originator.clone());

        let decision = self
            .access
            .check(originator, target, Permission::NOTIFY)
            .await;
        if !decision.is_allowed() {
            session.advance(PollState::Unauthorized);
            warn!(
                target_id = %target,
                originator = %originator,
                "Poll rejected: originator lacks NOTIFY on channel"
            );
            return Err(DeliveryError::PermissionDenied {
                originator: originator.clone(),
                target: target.clone(),
            });
        }

        session.advance(PollState::Waiting);
        let wait = self.config.effective_poll_wait(max_wait);

        match self.queue.dequeue_blocking(target, wait).await {
            Ok(pending) => {
                session.advance(PollState::Delivered);
                debug!(
                    target_id = %target,
                    request_id = %pending.request_id,
                    elapsed_ms = session.elapsed_ms(),
                    "Poll delivered request"
                );
                Ok(QueuedNotification::from_pending(pending, Instant::now()))
            }
            Err(err) => {
                session.advance(PollState::TimedOut);
                debug!(
                    target_id = %target,
                    state = ?session.state(),
                    elapsed_ms = session.elapsed_ms(),
                    "Poll ended without delivery"
                );
                Err(err)
            }
        }
    }

    async fn submit_async(
        &self,
        target: &ChannelTarget,
        request: M2mRequest,
        max_wait: Option<Duration>,
    ) -> DeliveryResult<M2mResponse> {
        let request_id = request.request_id.clone();
        if request.expires_in().is_some_and(|expires_in| expires_in.is_zero()) {
            debug!(request_id = %request_id, "Request expired before queueing");
            return Err(DeliveryError::RequestTimeout { request_id });
        }

        let wait = max_wait.unwrap_or_else(|| self.config.default_response_wait());
        let lifetime = self.entry_lifetime(&request, wait);

        // Park first, so a response racing the enqueue still finds its waiter.
        let waiter = self
            .correlator
            .register(request_id.clone(), target.originator.clone(), wait)?;

        let now = Instant::now();
        let pending =
            PendingRequest::from_request(request, target.originator.clone(), now, now + lifetime);
        self.queue.enqueue(&target.resource_id, pending)?;
        let _queued = QueuedEntry {
            queue: &self.queue,
            target: &target.resource_id,
            request_id: request_id.clone(),
        };

        info!(
            target_id = %target.resource_id,
            request_id = %request_id,
            wait_ms = wait.as_millis() as u64,
            "Request queued for polling target"
        );

        let response = waiter.wait().await?;
        Ok(response.into_response(target.originator.clone()))
    }

    async fn deliver_response(&self, response: M2mResponse) -> DeliveryResult<()> {
        self.correlator.deliver(response)
    }

    async fn cancel(&self, request_id: &RequestId) -> bool {
        self.correlator.cancel(request_id)
    }
}

/// Background task sweeping expired entries and stale waiters.
pub async fn cleanup_task(service: Arc<PollingChannelService>, interval: Duration) {
    let mut sweep = tokio::time::interval(interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep.tick().await;
        let (entries, waiters) = service.purge_expired();
        if entries > 0 || waiters > 0 {
            debug!(entries = entries, waiters = waiters, "Swept polling channel");
        }
    }
}
