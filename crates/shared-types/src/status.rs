//! Response status codes.
//!
//! Numeric values follow the oneM2M response status code table. One extra
//! code, [`ResponseStatusCode::MixedResponses`], is designated for aggregated
//! fan-out results whose members did not all succeed identically. It sits in
//! the 1xxx class so it can never be mistaken for a success (2xxx) or a
//! failure (4xxx-6xxx).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ResponseStatusCode {
    Accepted,
    AcceptedNonBlockingRequestSynch,
    AcceptedNonBlockingRequestAsynch,
    MixedResponses,
    Ok,
    Created,
    Deleted,
    Updated,
    BadRequest,
    NotFound,
    OperationNotAllowed,
    RequestTimeout,
    OriginatorHasNoPrivilege,
    Conflict,
    InternalServerError,
    NotImplemented,
    TargetNotReachable,
    ReceiverHasNoPrivileges,
    RemoteEntityNotReachable,
    CrossResourceOperationFailure,
    MaxNumberOfMemberExceeded,
}

impl ResponseStatusCode {
    pub fn code(self) -> u16 {
        match self {
            Self::Accepted => 1000,
            Self::AcceptedNonBlockingRequestSynch => 1001,
            Self::AcceptedNonBlockingRequestAsynch => 1002,
            Self::MixedResponses => 1003,
            Self::Ok => 2000,
            Self::Created => 2001,
            Self::Deleted => 2002,
            Self::Updated => 2004,
            Self::BadRequest => 4000,
            Self::NotFound => 4004,
            Self::OperationNotAllowed => 4005,
            Self::RequestTimeout => 4008,
            Self::OriginatorHasNoPrivilege => 4103,
            Self::Conflict => 4105,
            Self::InternalServerError => 5000,
            Self::NotImplemented => 5001,
            Self::TargetNotReachable => 5103,
            Self::ReceiverHasNoPrivileges => 5105,
            Self::RemoteEntityNotReachable => 5107,
            Self::CrossResourceOperationFailure => 5221,
            Self::MaxNumberOfMemberExceeded => 6010,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            1000 => Self::Accepted,
            1001 => Self::AcceptedNonBlockingRequestSynch,
            1002 => Self::AcceptedNonBlockingRequestAsynch,
            1003 => Self::MixedResponses,
            2000 => Self::Ok,
            2001 => Self::Created,
            2002 => Self::Deleted,
            2004 => Self::Updated,
            4000 => Self::BadRequest,
            4004 => Self::NotFound,
            4005 => Self::OperationNotAllowed,
            4008 => Self::RequestTimeout,
            4103 => Self::OriginatorHasNoPrivilege,
            4105 => Self::Conflict,
            5000 => Self::InternalServerError,
            5001 => Self::NotImplemented,
            5103 => Self::TargetNotReachable,
            5105 => Self::ReceiverHasNoPrivileges,
            5107 => Self::RemoteEntityNotReachable,
            5221 => Self::CrossResourceOperationFailure,
            6010 => Self::MaxNumberOfMemberExceeded,
            _ => return None,
        };
        Some(status)
    }

    /// 2xxx codes.
    pub fn is_success(self) -> bool {
        (2000..3000).contains(&self.code())
    }

    /// 4xxx and above.
    pub fn is_failure(self) -> bool {
        self.code() >= 4000
    }
}

impl fmt::Display for ResponseStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

impl From<ResponseStatusCode> for u16 {
    fn from(status: ResponseStatusCode) -> u16 {
        status.code()
    }
}

impl TryFrom<u16> for ResponseStatusCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown response status code: {}", code))
    }
}
