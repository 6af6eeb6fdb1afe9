//! # Polling Channel Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Lets an entity that cannot be reached directly retrieve the requests queued
//! for it by long-polling, and gives the original submitter a synchronous
//! looking reply by parking it until the correlated response arrives or its
//! deadline elapses.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | FIFO per target | `domain/queue.rs` - `VecDeque` per mailbox, `pop_front` only |
//! | Expired entries dropped silently | `domain/queue.rs` - `pop_live()` |
//! | Targets independent | `domain/queue.rs` - one `Mailbox` (mutex + notify) per target |
//! | Response only from expected identity | `domain/correlator.rs` - `deliver()` |
//! | Slot released on every exit path | `MailboxLease`, `ResponseWaiter`, `Submission` drop guards |
//!
//! ## Poll State Machine
//!
//! ```text
//! IDLE ──authorized──→ WAITING ──dequeued──→ DELIVERED
//!   │                     │
//!   │                     └── deadline ──→ TIMED_OUT
//!   └── denied ──→ UNAUTHORIZED
//! ```
//!
//! ## Submit / Poll / Respond Flow
//!
//! ```text
//! submitter ── submit_async ──→ correlator.register ─→ queue.enqueue ─→ (parked)
//!                                                            │
//! poller    ── handle_poll ───→ access check ─→ dequeue_blocking ─→ notification
//!                                                                        │
//! poller    ── deliver_response ──→ correlator.deliver ──→ submitter released
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! domain/config.rs     - PollingConfig
//! domain/entities.rs   - PendingRequest, QueuedNotification, PendingResponse, PollState
//! domain/queue.rs      - RequestQueue (per-target mailboxes)
//! domain/correlator.rs - ResponseCorrelator (per-request waiters)
//! ports/inbound.rs     - PollingChannelApi
//! service.rs           - PollingChannelService
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::PollingChannelApi;
pub use service::{cleanup_task, PollingChannelService};
