//! # Delivery Container
//!
//! Holds one CSE's delivery services with their collaborators.
//!
//! ## Wiring
//!
//! ```text
//! InMemoryDirectory ─┬─→ GroupFanOutService ──dispatch──→ CseRouter
//! StaticAccessPolicy ┤                                       │
//!                    └─→ PollingChannelService ←─submit_async┘
//! ```
//!
//! The router holds only a weak handle to the fan-out service, so dropping
//! the container frees the whole graph.

pub mod config;
pub mod services;

pub use config::{ConfigError, CseConfig};
pub use services::DeliveryContainer;
