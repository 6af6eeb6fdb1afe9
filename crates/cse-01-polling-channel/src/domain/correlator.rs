//! Response Correlator - parks submitters until their response arrives.
//!
//! Maps request IDs to waiting submitters. A waiter is released by exactly
//! one of: a response from the expected identity, its deadline, or
//! cancellation. Whichever side removes the map entry first owns the outcome,
//! so the cleanup is idempotent regardless of race order.
//!
//! Flow:
//! 1. Submitter calls `register()` and gets a `ResponseWaiter`
//! 2. The request is queued for the target
//! 3. The target answers and the endpoint calls `deliver()`
//! 4. Submitter awaits `ResponseWaiter::wait()` until release or deadline

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{DeliveryError, DeliveryResult, M2mResponse, Originator, RequestId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::entities::PendingResponse;

/// How a waiter was released.
#[derive(Debug)]
enum Release {
    Response(PendingResponse),
    Cancelled,
}

/// A submitter waiting for its response
struct Waiter {
    /// Distinguishes this registration from a later one reusing the same ID.
    ticket: u64,
    /// Only responses from this identity may complete the waiter.
    expected: Originator,
    sender: oneshot::Sender<Release>,
    registered_at: Instant,
    deadline: Instant,
}

/// Statistics for the response correlator
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    /// Responses rejected for coming from the wrong identity.
    pub total_mismatched: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
}

/// Correlates out-of-band responses with parked submitters.
pub struct ResponseCorrelator {
    waiters: Arc<DashMap<RequestId, Waiter>>,
    next_ticket: AtomicU64,
    stats: Arc<CorrelatorStats>,
}

impl Default for ResponseCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self {
            waiters: Arc::new(DashMap::new()),
            next_ticket: AtomicU64::new(1),
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    /// Register a waiter for `request_id` that only `expected` may answer.
    ///
    /// # Errors
    /// - `DuplicateRequestId`: a waiter for this ID is already parked
    pub fn register(
        &self,
        request_id: RequestId,
        expected: Originator,
        max_wait: Duration,
    ) -> DeliveryResult<ResponseWaiter> {
        let now = Instant::now();
        let deadline = now + max_wait;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        match self.waiters.entry(request_id.clone()) {
            Entry::Occupied(_) => return Err(DeliveryError::DuplicateRequestId(request_id)),
            Entry::Vacant(slot) => {
                slot.insert(Waiter {
                    ticket,
                    expected: expected.clone(),
                    sender,
                    registered_at: now,
                    deadline,
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            request_id = %request_id,
            expected = %expected,
            max_wait_ms = max_wait.as_millis() as u64,
            "Registered response waiter"
        );

        Ok(ResponseWaiter {
            request_id,
            ticket,
            deadline,
            receiver,
            waiters: self.waiters.clone(),
            stats: self.stats.clone(),
        })
    }

    /// Register and wait in one step.
    pub async fn await_response(
        &self,
        request_id: RequestId,
        expected: Originator,
        max_wait: Duration,
    ) -> DeliveryResult<PendingResponse> {
        self.register(request_id, expected, max_wait)?.wait().await
    }

    /// Hand `response` to its waiter.
    ///
    /// # Errors
    /// - `OriginatorMismatch`: sent by someone other than the expected
    ///   identity; the waiter keeps waiting
    /// - `NotFound`: nobody is waiting for this request ID
    /// - `Cancelled`: the waiter went away while the response was in flight
    pub fn deliver(&self, response: M2mResponse) -> DeliveryResult<()> {
        let request_id = response.request_id.clone();
        let removed = self
            .waiters
            .remove_if(&request_id, |_, waiter| waiter.expected == response.from);

        let Some((_, waiter)) = removed else {
            return Err(self.reject(&request_id, &response.from));
        };

        let latency = waiter.registered_at.elapsed();
        let released = PendingResponse::from_response(response, Instant::now());
        match waiter.sender.send(Release::Response(released)) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %request_id,
                    latency_ms = latency.as_millis() as u64,
                    "Completed response waiter"
                );
                Ok(())
            }
            Err(_) => {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %request_id, "Response waiter dropped before delivery");
                Err(DeliveryError::Cancelled { request_id })
            }
        }
    }

    fn reject(&self, request_id: &RequestId, actual: &Originator) -> DeliveryError {
        let expected = self
            .waiters
            .get(request_id)
            .map(|waiter| waiter.expected.clone());

        match expected {
            Some(expected) => {
                self.stats.total_mismatched.fetch_add(1, Ordering::Relaxed);
                warn!(
                    request_id = %request_id,
                    expected = %expected,
                    actual = %actual,
                    "Rejecting response from unexpected originator"
                );
                DeliveryError::OriginatorMismatch {
                    request_id: request_id.clone(),
                    expected,
                    actual: actual.clone(),
                }
            }
            None => {
                warn!(request_id = %request_id, "Response for unknown or expired request");
                DeliveryError::NotFound(format!("no pending request {request_id}"))
            }
        }
    }

    /// Release a waiter without a response.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        let Some((_, waiter)) = self.waiters.remove(request_id) else {
            return false;
        };
        // A dropped receiver means the waiter already left; nothing to release.
        let _ = waiter.sender.send(Release::Cancelled);
        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %request_id, "Cancelled response waiter");
        true
    }

    /// Remove waiters past their deadline (TTL cleanup).
    ///
    /// Waiters normally remove themselves; this only catches entries whose
    /// owner never got to run.
    pub fn remove_stale(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.waiters.retain(|id, waiter| {
            if now > waiter.deadline {
                warn!(
                    request_id = %id,
                    overdue_ms = now.duration_since(waiter.deadline).as_millis() as u64,
                    "Removing stale response waiter"
                );
                removed += 1;
                false
            } else {
                true
            }
        });

        self.stats
            .total_timeouts
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.waiters.contains_key(request_id)
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }
}

/// Handle held by a parked submitter. Dropping it releases the slot.
pub struct ResponseWaiter {
    request_id: RequestId,
    ticket: u64,
    deadline: Instant,
    receiver: oneshot::Receiver<Release>,
    waiters: Arc<DashMap<RequestId, Waiter>>,
    stats: Arc<CorrelatorStats>,
}

impl ResponseWaiter {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait until released or the deadline passes.
    ///
    /// # Errors
    /// - `RequestTimeout`: no matching response before the deadline
    /// - `Cancelled`: released by `ResponseCorrelator::cancel`
    pub async fn wait(mut self) -> DeliveryResult<PendingResponse> {
        let release = match timeout_at(self.deadline, &mut self.receiver).await {
            Ok(received) => received.ok(),
            Err(_) => {
                if self.retire() {
                    self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                    None
                } else {
                    // Someone removed the entry first and owns the outcome.
                    (&mut self.receiver).await.ok()
                }
            }
        };

        match release {
            Some(Release::Response(response)) => Ok(response),
            Some(Release::Cancelled) => Err(DeliveryError::Cancelled {
                request_id: self.request_id.clone(),
            }),
            // Counted by whoever removed the entry: the branch above, or
            // `remove_stale`.
            None => {
                debug!(request_id = %self.request_id, "Response wait timed out");
                Err(DeliveryError::RequestTimeout {
                    request_id: self.request_id.clone(),
                })
            }
        }
    }

    /// Remove this registration if it is still in the map.
    fn retire(&self) -> bool {
        self.waiters
            .remove_if(&self.request_id, |_, waiter| waiter.ticket == self.ticket)
            .is_some()
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        if self.retire() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %self.request_id, "Response waiter abandoned");
        }
    }
}
