//! # Shared Types Crate
//!
//! This crate contains the identifiers, request/response types, the delivery
//! error taxonomy and the collaborator ports used by every delivery
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Narrow Collaborators**: The delivery core only talks to the rest of the
//!   CSE through [`AccessControlGate`], [`ResourceDirectory`] and
//!   [`RequestRouter`].
//! - **Typed Failures**: Every failure a caller can observe is a
//!   [`DeliveryError`] variant with a stable [`ResponseStatusCode`].

pub mod entities;
pub mod errors;
pub mod ports;
pub mod status;

pub use entities::*;
pub use errors::*;
pub use ports::*;
pub use status::*;
