//! # Domain Layer - Polling Channel Subsystem
//!
//! ## Components
//!
//! - `config`: PollingConfig (wait ceilings, TTL, mailbox bound)
//! - `entities`: PendingRequest, QueuedNotification, PendingResponse, PollState
//! - `queue`: RequestQueue with per-target blocking dequeue
//! - `correlator`: ResponseCorrelator matching responses to parked submitters

pub mod config;
pub mod correlator;
pub mod entities;
pub mod queue;

pub use config::*;
pub use correlator::*;
pub use entities::*;
pub use queue::*;
