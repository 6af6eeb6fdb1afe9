//! # Core Domain Entities
//!
//! Identifiers and the request/response shapes that travel through the
//! delivery core.
//!
//! ## Clusters
//!
//! - **Identity**: `ResourceId`, `Originator`, `RequestId`
//! - **Operations**: `Operation`, `Permission`, `ResourceKind`
//! - **Messages**: `M2mRequest`, `M2mResponse`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::status::ResponseStatusCode;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Address of a resource in the CSE resource tree (structured or unstructured).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative path below this resource.
    pub fn join(&self, tail: &str) -> Self {
        let tail = tail.trim_matches('/');
        if tail.is_empty() {
            return self.clone();
        }
        Self(format!("{}/{}", self.0.trim_end_matches('/'), tail))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity string presented by a caller and checked against access control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Originator(String);

impl Originator {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Originator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Originator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Request identifier used to correlate a request with its response.
///
/// Either supplied by the caller or generated (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, process-unique request identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// CLUSTER B: OPERATIONS AND PERMISSIONS
// =============================================================================

/// Request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
    Notify,
    Discovery,
}

impl Operation {
    /// The permission an originator must hold to perform this operation.
    pub fn permission(self) -> Permission {
        match self {
            Self::Create => Permission::CREATE,
            Self::Retrieve => Permission::RETRIEVE,
            Self::Update => Permission::UPDATE,
            Self::Delete => Permission::DELETE,
            Self::Notify => Permission::NOTIFY,
            Self::Discovery => Permission::DISCOVERY,
        }
    }

    /// Success code a target returns when this operation completes.
    pub fn success_code(self) -> ResponseStatusCode {
        match self {
            Self::Create => ResponseStatusCode::Created,
            Self::Update => ResponseStatusCode::Updated,
            Self::Delete => ResponseStatusCode::Deleted,
            Self::Retrieve | Self::Notify | Self::Discovery => ResponseStatusCode::Ok,
        }
    }

    /// Whether the operation returns a collection when applied to many targets.
    pub fn is_retrieve_many(self) -> bool {
        matches!(self, Self::Retrieve | Self::Discovery)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Retrieve => "RETRIEVE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Notify => "NOTIFY",
            Self::Discovery => "DISCOVERY",
        };
        f.write_str(name)
    }
}

/// Access control permission bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u8);

impl Permission {
    pub const NONE: Self = Self(0);
    pub const CREATE: Self = Self(1);
    pub const RETRIEVE: Self = Self(2);
    pub const UPDATE: Self = Self(4);
    pub const DELETE: Self = Self(8);
    pub const NOTIFY: Self = Self(16);
    pub const DISCOVERY: Self = Self(32);
    pub const ALL: Self = Self(63);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: Permission) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Permission) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Kind of a resolved resource, as far as delivery is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A group; requests to it are expanded over its members.
    Group,
    /// An entity that must be reached through its polling channel.
    NonReachable,
    /// Any other resource handled by normal dispatch.
    Plain,
}

// =============================================================================
// CLUSTER C: MESSAGES
// =============================================================================

/// A primitive request addressed to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct M2mRequest {
    /// Request identifier (`rqi`).
    pub request_id: RequestId,
    pub operation: Operation,
    /// Target address (`to`).
    pub to: ResourceId,
    /// Originator (`fr`).
    pub from: Originator,
    /// Primitive content (`pc`).
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Relative request expiration (`rqet`), in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

impl M2mRequest {
    pub fn new(operation: Operation, to: impl Into<ResourceId>, from: Originator) -> Self {
        Self {
            request_id: RequestId::generate(),
            operation,
            to: to.into(),
            from,
            payload: serde_json::Value::Null,
            expires_in_ms: None,
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_expiration(mut self, expires_in: Duration) -> Self {
        self.expires_in_ms = Some(expires_in.as_millis() as u64);
        self
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in_ms.map(Duration::from_millis)
    }

    /// Copy of this request re-addressed to `to` under a new request id.
    pub fn readdressed(&self, to: ResourceId, request_id: RequestId) -> Self {
        Self {
            request_id,
            to,
            ..self.clone()
        }
    }
}

/// A response primitive, either produced by normal dispatch or returned
/// out-of-band by a polling entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct M2mResponse {
    pub request_id: RequestId,
    /// Response status code (`rsc`).
    pub status: ResponseStatusCode,
    /// Identity of the entity that produced the response.
    pub from: Originator,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl M2mResponse {
    pub fn new(request_id: RequestId, status: ResponseStatusCode, from: Originator) -> Self {
        Self {
            request_id,
            status,
            from,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
