//! # Collaborator Ports
//!
//! The narrow interfaces the delivery core consumes from the rest of the CSE.
//! Implementations live outside the subsystem crates (the runtime wires
//! in-memory versions; tests use mocks).
//!
//! | Port | Used by |
//! |------|---------|
//! | `AccessControlGate` | polling channel (NOTIFY on the channel), fan-out (operation on the group) |
//! | `ResourceDirectory` | fan-out (member resolution, nested group detection) |
//! | `RequestRouter` | fan-out (per-member dispatch) |

use async_trait::async_trait;

use crate::entities::{M2mRequest, M2mResponse, Originator, Permission, ResourceId, ResourceKind};
use crate::errors::DeliveryResult;

/// Outcome of an access-control check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Permission decision per (originator, target, permission).
#[async_trait]
pub trait AccessControlGate: Send + Sync {
    async fn check(
        &self,
        originator: &Originator,
        target: &ResourceId,
        permission: Permission,
    ) -> AccessDecision;
}

/// Resolution of group membership and resource kinds.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Ordered member addresses of a group.
    ///
    /// # Errors
    /// - `NotFound`: the group does not exist or is not a group
    async fn resolve_members(&self, group: &ResourceId) -> DeliveryResult<Vec<ResourceId>>;

    /// Kind of the resource at `id`, or `None` if it does not exist.
    async fn resource_kind(&self, id: &ResourceId) -> Option<ResourceKind>;
}

/// Normal per-resource request dispatch. Must be reentrant.
#[async_trait]
pub trait RequestRouter: Send + Sync {
    async fn dispatch(&self, request: M2mRequest) -> DeliveryResult<M2mResponse>;
}
