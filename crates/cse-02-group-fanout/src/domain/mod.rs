//! # Domain Layer - Group Fan-Out Subsystem
//!
//! - `address`: fan-out point addressing
//! - `config`: FanOutConfig
//! - `job`: FanOutJob and its member slots
//! - `aggregation`: AggregatedResponse and the aggregation policy

pub mod address;
pub mod aggregation;
pub mod config;
pub mod job;

pub use address::*;
pub use aggregation::*;
pub use config::*;
pub use job::*;
