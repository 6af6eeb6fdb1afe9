//! Request Queue - per-target mailboxes drained by long-polling.
//!
//! Each target owns a `Mailbox`: a FIFO guarded by its own mutex plus a
//! `Notify` for arrivals. The outer `DashMap` is only touched to find or
//! retire a mailbox, so a poller blocked on one target never holds anything
//! another target needs.
//!
//! Lock order: map shard, then mailbox mutex. Never the reverse.

use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::{DeliveryError, DeliveryResult, RequestId, ResourceId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::entities::PendingRequest;

#[derive(Default)]
struct Mailbox {
    entries: Mutex<VecDeque<PendingRequest>>,
    arrivals: Notify,
}

impl Mailbox {
    fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Statistics for the request queue
#[derive(Debug, Default)]
pub struct QueueStats {
    pub total_enqueued: AtomicU64,
    pub total_delivered: AtomicU64,
    /// Entries discarded because they were past `expires_at`.
    pub total_expired: AtomicU64,
    pub total_rejected_full: AtomicU64,
    pub total_poll_timeouts: AtomicU64,
    /// Entries withdrawn by their submitter before delivery.
    pub total_withdrawn: AtomicU64,
}

/// Per-target request mailboxes.
pub struct RequestQueue {
    mailboxes: DashMap<ResourceId, Arc<Mailbox>>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

/// Keeps a mailbox alive while a poller waits on it and retires it afterwards
/// if nobody else is using it.
struct MailboxLease<'a> {
    queue: &'a RequestQueue,
    target: &'a ResourceId,
    mailbox: Arc<Mailbox>,
}

impl Drop for MailboxLease<'_> {
    fn drop(&mut self) {
        // map + this lease
        self.queue.mailboxes.remove_if(self.target, |_, mailbox| {
            Arc::strong_count(mailbox) == 2 && mailbox.is_empty()
        });
    }
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            mailboxes: DashMap::new(),
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    fn mailbox(&self, target: &ResourceId) -> Arc<Mailbox> {
        self.mailboxes
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Mailbox::default()))
            .value()
            .clone()
    }

    /// Append `request` to `target`'s mailbox.
    ///
    /// # Errors
    /// - `QueueFull`: the mailbox still holds `capacity` live entries after
    ///   expired ones were purged
    pub fn enqueue(&self, target: &ResourceId, request: PendingRequest) -> DeliveryResult<()> {
        let mailbox = self.mailbox(target);
        let request_id = request.request_id.clone();
        {
            let mut entries = mailbox.entries.lock();
            if entries.len() >= self.capacity {
                let purged = self.purge_locked(&mut entries, Instant::now());
                if entries.len() >= self.capacity {
                    self.stats.total_rejected_full.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target_id = %target,
                        capacity = self.capacity,
                        purged = purged,
                        "Mailbox full, rejecting request"
                    );
                    return Err(DeliveryError::QueueFull {
                        target: target.clone(),
                        capacity: self.capacity,
                    });
                }
            }
            entries.push_back(request);
        }
        mailbox.arrivals.notify_one();
        self.stats.total_enqueued.fetch_add(1, Ordering::Relaxed);

        debug!(target_id = %target, request_id = %request_id, "Enqueued request");
        Ok(())
    }

    /// Oldest non-expired entry for `target`, waiting up to `timeout` for one
    /// to arrive. Expired entries met on the way are dropped.
    ///
    /// # Errors
    /// - `Timeout`: nothing qualified before the deadline
    pub async fn dequeue_blocking(
        &self,
        target: &ResourceId,
        timeout: Duration,
    ) -> DeliveryResult<PendingRequest> {
        let started = Instant::now();
        let deadline = started + timeout;
        let lease = MailboxLease {
            queue: self,
            target,
            mailbox: self.mailbox(target),
        };

        loop {
            let notified = lease.mailbox.arrivals.notified();
            tokio::pin!(notified);
            // Register interest before looking, so an enqueue in between is not missed.
            notified.as_mut().enable();

            if let Some(request) = self.pop_live(&lease.mailbox) {
                return Ok(request);
            }

            if timeout_at(deadline, notified).await.is_err() {
                self.stats.total_poll_timeouts.fetch_add(1, Ordering::Relaxed);
                let waited_ms = started.elapsed().as_millis() as u64;
                debug!(target_id = %target, waited_ms = waited_ms, "Poll timed out");
                return Err(DeliveryError::Timeout {
                    target: target.clone(),
                    waited_ms,
                });
            }
        }
    }

    fn pop_live(&self, mailbox: &Mailbox) -> Option<PendingRequest> {
        let now = Instant::now();
        let mut entries = mailbox.entries.lock();
        while let Some(front) = entries.pop_front() {
            if front.is_expired(now) {
                self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %front.request_id, "Dropping expired request");
                continue;
            }
            self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
            if !entries.is_empty() {
                // Hand the remaining entries to the next waiting poller.
                mailbox.arrivals.notify_one();
            }
            return Some(front);
        }
        None
    }

    fn purge_locked(&self, entries: &mut VecDeque<PendingRequest>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|entry| !entry.is_expired(now));
        let purged = before - entries.len();
        self.stats
            .total_expired
            .fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Remove a still-queued request, e.g. when its submitter went away.
    ///
    /// Returns true if the entry was found.
    pub fn withdraw(&self, target: &ResourceId, request_id: &RequestId) -> bool {
        let Some(mailbox) = self.mailboxes.get(target).map(|m| m.value().clone()) else {
            return false;
        };
        let withdrawn = {
            let mut entries = mailbox.entries.lock();
            match entries.iter().position(|e| &e.request_id == request_id) {
                Some(index) => entries.remove(index).is_some(),
                None => false,
            }
        };
        drop(mailbox);

        if withdrawn {
            self.stats.total_withdrawn.fetch_add(1, Ordering::Relaxed);
            self.mailboxes.remove_if(target, |_, mailbox| {
                Arc::strong_count(mailbox) == 1 && mailbox.is_empty()
            });
            debug!(target_id = %target, request_id = %request_id, "Withdrew queued request");
        }
        withdrawn
    }

    /// Drop expired entries from every mailbox and retire idle empty ones.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mailboxes: Vec<Arc<Mailbox>> = self
            .mailboxes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let purged: usize = mailboxes
            .iter()
            .map(|mailbox| self.purge_locked(&mut mailbox.entries.lock(), now))
            .sum();
        drop(mailboxes);

        self.mailboxes
            .retain(|_, mailbox| Arc::strong_count(mailbox) > 1 || !mailbox.is_empty());
        purged
    }

    /// Number of entries queued for `target`, expired ones included.
    pub fn len(&self, target: &ResourceId) -> usize {
        self.mailboxes
            .get(target)
            .map_or(0, |mailbox| mailbox.entries.lock().len())
    }

    pub fn is_empty(&self, target: &ResourceId) -> bool {
        self.len(target) == 0
    }

    /// Number of live mailboxes.
    pub fn mailbox_count(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
