//! Adapters implementing the delivery core's outbound ports.

pub mod access;
pub mod directory;
pub mod router;

pub use access::StaticAccessPolicy;
pub use directory::{DirectoryEntry, InMemoryDirectory};
pub use router::CseRouter;
