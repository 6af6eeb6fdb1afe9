//! Fan-out job and member slots.

use serde::Serialize;
use shared_types::{DeliveryError, DeliveryResult, M2mResponse, Operation, RequestId, ResourceId};
use tokio::time::Instant;

/// Member slot status.
///
/// ```text
/// PENDING ──reply (success)──→ COMPLETED
///    │
///    ├── reply (failure) / error ──→ FAILED
///    └── job deadline ──→ TIMED_OUT
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotStatus {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

impl SlotStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// How a member's dispatch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberResult {
    Replied(M2mResponse),
    Error(DeliveryError),
    DeadlineElapsed,
}

impl From<DeliveryResult<M2mResponse>> for MemberResult {
    fn from(result: DeliveryResult<M2mResponse>) -> Self {
        match result {
            Ok(response) => Self::Replied(response),
            Err(err) => Self::Error(err),
        }
    }
}

/// One member's place in a job.
#[derive(Debug, Clone)]
pub struct MemberSlot {
    pub member_id: ResourceId,
    pub sub_request_id: RequestId,
    status: SlotStatus,
    result: Option<MemberResult>,
}

impl MemberSlot {
    fn new(member_id: ResourceId) -> Self {
        Self {
            member_id,
            sub_request_id: RequestId::generate(),
            status: SlotStatus::Pending,
            result: None,
        }
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn result(&self) -> Option<&MemberResult> {
        self.result.as_ref()
    }
}

/// Per-call record of a fan-out. Never outlives the call.
#[derive(Debug)]
pub struct FanOutJob {
    pub parent_request_id: RequestId,
    pub operation: Operation,
    pub deadline: Instant,
    pub depth: u8,
    slots: Vec<MemberSlot>,
}

impl FanOutJob {
    /// One pending slot per member, in member order.
    pub fn new(
        parent_request_id: RequestId,
        operation: Operation,
        deadline: Instant,
        depth: u8,
        members: Vec<ResourceId>,
    ) -> Self {
        Self {
            parent_request_id,
            operation,
            deadline,
            depth,
            slots: members.into_iter().map(MemberSlot::new).collect(),
        }
    }

    pub fn slots(&self) -> &[MemberSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the outcome for slot `index`.
    ///
    /// Only a pending slot accepts an outcome; returns false otherwise.
    pub fn record(&mut self, index: usize, result: MemberResult) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if slot.status.is_terminal() {
            return false;
        }
        slot.status = match &result {
            MemberResult::Replied(response) if response.status.is_failure() => SlotStatus::Failed,
            MemberResult::Replied(_) => SlotStatus::Completed,
            MemberResult::Error(_) => SlotStatus::Failed,
            MemberResult::DeadlineElapsed => SlotStatus::TimedOut,
        };
        slot.result = Some(result);
        true
    }

    /// Time out every slot still pending. Returns how many were closed.
    pub fn expire_pending(&mut self) -> usize {
        let pending: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.status.is_terminal())
            .map(|(index, _)| index)
            .collect();
        for &index in &pending {
            self.record(index, MemberResult::DeadlineElapsed);
        }
        pending.len()
    }

    pub fn count(&self, status: SlotStatus) -> usize {
        self.slots.iter().filter(|slot| slot.status == status).count()
    }
}
