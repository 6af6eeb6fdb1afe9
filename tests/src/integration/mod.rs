//! Cross-crate integration flows.
//!
//! Each flow builds its own `DeliveryContainer`, so tests never share queue
//! or correlator state.

pub mod fanout_flow;
pub mod polling_flow;
pub mod runtime_flow;

use cse_runtime::{CseConfig, DeliveryContainer};
use shared_types::{Originator, Permission};
use std::sync::Arc;

/// Root of the test resource tree.
pub const CSE_BASE: &str = "cse-in";

/// Originator holding every permission on the whole tree.
pub fn admin() -> Originator {
    Originator::from("CAdmin")
}

/// A container with `admin()` granted everything under `CSE_BASE`.
pub fn container_with(config: CseConfig) -> Arc<DeliveryContainer> {
    let container = DeliveryContainer::new(config);
    container.access.grant(admin(), CSE_BASE, Permission::ALL);
    container.directory.put_content(CSE_BASE, serde_json::Value::Null);
    Arc::new(container)
}

pub fn test_container() -> Arc<DeliveryContainer> {
    container_with(CseConfig::for_testing())
}
