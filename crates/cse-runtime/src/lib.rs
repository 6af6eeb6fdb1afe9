//! # CSE Runtime Library
//!
//! Exposes the runtime's container and adapters for the binary and for
//! integration tests.
//!
//! - `container/` - `CseConfig` loading and the `DeliveryContainer`
//! - `adapters/` - in-memory `ResourceDirectory`, `AccessControlGate` and
//!   the `RequestRouter` that sends requests to fan-out, to a polling
//!   channel, or answers them locally

pub mod adapters;
pub mod container;

pub use adapters::{CseRouter, DirectoryEntry, InMemoryDirectory, StaticAccessPolicy};
pub use container::{ConfigError, CseConfig, DeliveryContainer};
