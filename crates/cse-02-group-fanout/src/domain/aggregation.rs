//! Aggregation policy.
//!
//! - Every slot completed with the same success code: that code, and the single
//!   logical result as payload (a list for retrieve-style operations, or when
//!   members disagree on the content).
//! - Anything else: `MixedResponses`, with one entry per slot in member order
//!   carrying the member id, its code and its content or error. Create
//!   entries also say whether the member's child was created.

use serde::Serialize;
use serde_json::{json, Value};
use shared_types::{
    M2mResponse, Operation, Originator, RequestId, ResourceId, ResponseStatusCode,
};

use super::job::{FanOutJob, MemberResult, MemberSlot, SlotStatus};

/// Final outcome of one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberOutcome {
    pub member_id: ResourceId,
    pub sub_request_id: RequestId,
    pub status: SlotStatus,
    pub code: ResponseStatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Create only: whether the member now holds the new child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

impl MemberOutcome {
    fn from_slot(slot: &MemberSlot, operation: Operation) -> Self {
        let (code, payload, error) = match slot.result() {
            Some(MemberResult::Replied(response)) => {
                (response.status, Some(response.payload.clone()), None)
            }
            Some(MemberResult::Error(err)) => (err.status_code(), None, Some(err.to_string())),
            Some(MemberResult::DeadlineElapsed) | None => (
                ResponseStatusCode::RequestTimeout,
                None,
                Some("no response before the job deadline".to_string()),
            ),
        };
        let created = (operation == Operation::Create)
            .then(|| slot.status() == SlotStatus::Completed && code == ResponseStatusCode::Created);

        Self {
            member_id: slot.member_id.clone(),
            sub_request_id: slot.sub_request_id.clone(),
            status: slot.status(),
            code,
            payload,
            error,
            created,
        }
    }

    /// Entry in a mixed-responses payload.
    fn to_entry(&self) -> Value {
        let mut entry = json!({
            "member": self.member_id.as_str(),
            "rqi": self.sub_request_id.as_str(),
            "rsc": self.code.code(),
        });
        if let Some(payload) = &self.payload {
            entry["pc"] = payload.clone();
        }
        if let Some(error) = &self.error {
            entry["error"] = Value::String(error.clone());
        }
        if let Some(created) = self.created {
            entry["created"] = Value::Bool(created);
        }
        entry
    }
}

/// Combined response of a fan-out job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResponse {
    pub parent_request_id: RequestId,
    pub status: ResponseStatusCode,
    pub payload: Value,
    pub members: Vec<MemberOutcome>,
}

impl AggregatedResponse {
    /// Apply the aggregation policy to a terminal job.
    pub fn from_job(job: &FanOutJob) -> Self {
        let members: Vec<MemberOutcome> = job
            .slots()
            .iter()
            .map(|slot| MemberOutcome::from_slot(slot, job.operation))
            .collect();

        // Only a shared success code collapses; anything else, a shared
        // mixed code from nested groups included, lists this job's members.
        let uniform = members.first().map(|first| first.code).filter(|&code| {
            code.is_success()
                && members
                    .iter()
                    .all(|m| m.status == SlotStatus::Completed && m.code == code)
        });

        let (status, payload) = match uniform {
            Some(code) => (code, Self::combined_payload(job.operation, &members)),
            None => {
                let entries = members.iter().map(MemberOutcome::to_entry).collect();
                (
                    ResponseStatusCode::MixedResponses,
                    json!({ "members": Value::Array(entries) }),
                )
            }
        };

        Self {
            parent_request_id: job.parent_request_id.clone(),
            status,
            payload,
            members,
        }
    }

    fn combined_payload(operation: Operation, members: &[MemberOutcome]) -> Value {
        let payloads: Vec<Value> = members
            .iter()
            .map(|m| m.payload.clone().unwrap_or(Value::Null))
            .collect();

        let all_equal = payloads.windows(2).all(|pair| pair[0] == pair[1]);
        if !operation.is_retrieve_many() && all_equal {
            payloads.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(payloads)
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.status == ResponseStatusCode::MixedResponses
    }

    pub fn count(&self, status: SlotStatus) -> usize {
        self.members.iter().filter(|m| m.status == status).count()
    }

    /// The response handed back to the original caller.
    pub fn into_response(self, from: Originator) -> M2mResponse {
        M2mResponse::new(self.parent_request_id, self.status, from).with_payload(self.payload)
    }
}
