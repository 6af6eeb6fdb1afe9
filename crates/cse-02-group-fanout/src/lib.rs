//! # Group Fan-Out Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Expands one operation addressed at a group (or its `fopt` fan-out point)
//! into one sub-request per member, dispatches them concurrently under a
//! single job deadline, and folds the member outcomes into one aggregated
//! response.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Empty or unknown group fails before any job exists | `service.rs` - `fan_out()` |
//! | Depth checked before resolution or dispatch | `service.rs` - `fan_out()` |
//! | Slots never regress | `domain/job.rs` - `FanOutJob::record()` |
//! | One deadline for the whole job | `service.rs` - every member wrapped in `timeout_at(deadline)` |
//! | Member failure never fails the job | `domain/aggregation.rs` - `MixedResponses` |
//!
//! ## Dispatch Flow
//!
//! ```text
//! handle_group_operation
//!   ├── parse address (<group>[/fopt[/<tail>]])
//!   ├── access check on the group
//!   └── fan_out(depth = 0, deadline = now + job_timeout)
//!         ├── resolve members
//!         ├── member is a group ──→ fan_out(depth + 1, same deadline)
//!         └── member is a leaf  ──→ worker permit ──→ router.dispatch
//!         └── join_all ──→ record slots ──→ aggregate
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::GroupFanOutApi;
pub use service::GroupFanOutService;
