//! Ports layer for the Polling Channel subsystem.
//!
//! - Inbound (Driving) port: `PollingChannelApi`
//! - Outbound (Driven) port: `AccessControlGate` from `shared-types`

pub mod inbound;

pub use inbound::*;
pub use shared_types::AccessControlGate;
