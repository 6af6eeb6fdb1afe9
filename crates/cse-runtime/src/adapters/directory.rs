//! In-memory resource directory.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use shared_types::{
    DeliveryError, DeliveryResult, Originator, ResourceDirectory, ResourceId, ResourceKind,
};

/// A registered resource.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryEntry {
    /// Ordered member addresses.
    Group { members: Vec<ResourceId> },
    /// An application entity. Non-reachable ones are served through their
    /// polling channel.
    Entity {
        originator: Originator,
        reachable: bool,
    },
    /// Plain content held by the CSE itself.
    Content { value: Value },
}

/// Resource registry keyed by address.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: DashMap<ResourceId, DirectoryEntry>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, id: impl Into<ResourceId>, members: &[&str]) {
        let members = members.iter().map(|m| ResourceId::from(*m)).collect();
        self.entries
            .insert(id.into(), DirectoryEntry::Group { members });
    }

    pub fn add_entity(&self, id: impl Into<ResourceId>, originator: Originator, reachable: bool) {
        self.entries.insert(
            id.into(),
            DirectoryEntry::Entity {
                originator,
                reachable,
            },
        );
    }

    pub fn put_content(&self, id: impl Into<ResourceId>, value: Value) {
        self.entries
            .insert(id.into(), DirectoryEntry::Content { value });
    }

    pub fn get(&self, id: &ResourceId) -> Option<DirectoryEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &ResourceId) -> Option<DirectoryEntry> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// The entity `id` belongs to: `id` itself or its nearest registered
    /// entity ancestor.
    pub fn owning_entity(&self, id: &ResourceId) -> Option<(ResourceId, Originator, bool)> {
        let mut path = id.as_str();
        loop {
            if let Some(entry) = self.entries.get(&ResourceId::from(path)) {
                if let DirectoryEntry::Entity {
                    originator,
                    reachable,
                } = entry.value()
                {
                    return Some((ResourceId::from(path), originator.clone(), *reachable));
                }
            }
            let (parent, _) = path.rsplit_once('/')?;
            path = parent;
        }
    }
}

#[async_trait]
impl ResourceDirectory for InMemoryDirectory {
    async fn resolve_members(&self, group: &ResourceId) -> DeliveryResult<Vec<ResourceId>> {
        match self.entries.get(group).as_deref() {
            Some(DirectoryEntry::Group { members }) => Ok(members.clone()),
            Some(_) => Err(DeliveryError::NotFound(format!("{group} is not a group"))),
            None => Err(DeliveryError::NotFound(format!("group {group}"))),
        }
    }

    async fn resource_kind(&self, id: &ResourceId) -> Option<ResourceKind> {
        self.entries.get(id).map(|entry| match entry.value() {
            DirectoryEntry::Group { .. } => ResourceKind::Group,
            DirectoryEntry::Entity {
                reachable: false, ..
            } => ResourceKind::NonReachable,
            _ => ResourceKind::Plain,
        })
    }
}
