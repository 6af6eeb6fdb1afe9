//! Static access policy.
//!
//! Grants are (originator, resource, permission bits). A grant on a resource
//! covers everything below it.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{AccessControlGate, AccessDecision, Originator, Permission, ResourceId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct StaticAccessPolicy {
    allow_all: bool,
    grants: RwLock<HashMap<Originator, Vec<(ResourceId, Permission)>>>,
}

impl StaticAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check succeeds.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    pub fn grant(&self, originator: Originator, resource: impl Into<ResourceId>, permission: Permission) {
        let resource = resource.into();
        let mut grants = self.grants.write();
        let entries = grants.entry(originator).or_default();
        match entries.iter_mut().find(|(id, _)| *id == resource) {
            Some((_, existing)) => *existing = *existing | permission,
            None => entries.push((resource, permission)),
        }
    }

    pub fn revoke_all(&self, originator: &Originator) {
        self.grants.write().remove(originator);
    }

    fn covers(granted: &ResourceId, target: &ResourceId) -> bool {
        let granted = granted.as_str().trim_end_matches('/');
        match target.as_str().strip_prefix(granted) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[async_trait]
impl AccessControlGate for StaticAccessPolicy {
    async fn check(
        &self,
        originator: &Originator,
        target: &ResourceId,
        permission: Permission,
    ) -> AccessDecision {
        if self.allow_all {
            return AccessDecision::Allow;
        }

        let allowed = self.grants.read().get(originator).is_some_and(|entries| {
            entries
                .iter()
                .any(|(id, granted)| Self::covers(id, target) && granted.contains(permission))
        });

        if allowed {
            AccessDecision::Allow
        } else {
            debug!(
                originator = %originator,
                target_id = %target,
                permission = permission.bits(),
                "Access denied"
            );
            AccessDecision::Deny
        }
    }
}
