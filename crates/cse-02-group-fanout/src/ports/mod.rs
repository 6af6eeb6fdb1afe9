//! Ports layer for the Group Fan-Out subsystem.
//!
//! - Inbound (Driving) port: `GroupFanOutApi`
//! - Outbound (Driven) ports: `AccessControlGate`, `ResourceDirectory`,
//!   `RequestRouter` from `shared-types`

pub mod inbound;

pub use inbound::*;
pub use shared_types::{AccessControlGate, RequestRouter, ResourceDirectory};
