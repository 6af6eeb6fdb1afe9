//! Fan-out point addressing.
//!
//! A group is addressed either directly (`<group>`) or through its virtual
//! fan-out point (`<group>/fopt`, optionally followed by a path that is
//! appended to every member: `<group>/fopt/<tail>` targets `<member>/<tail>`).

use shared_types::ResourceId;

const FANOUT_POINT: &str = "fopt";

/// A parsed fan-out target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutAddress {
    pub group: ResourceId,
    /// Path below each member, if addressed through `fopt/<tail>`.
    pub tail: Option<String>,
}

impl FanOutAddress {
    pub fn parse(address: &ResourceId) -> Self {
        let raw = address.as_str().trim_end_matches('/');
        let segments: Vec<&str> = raw.split('/').collect();

        // Last `fopt` segment wins.
        match segments.iter().rposition(|s| *s == FANOUT_POINT) {
            Some(index) if index > 0 => {
                let tail = segments[index + 1..].join("/");
                Self {
                    group: ResourceId::new(segments[..index].join("/")),
                    tail: (!tail.is_empty()).then_some(tail),
                }
            }
            _ => Self {
                group: ResourceId::new(raw),
                tail: None,
            },
        }
    }

    /// `member` seen as the next fan-out level below this one.
    ///
    /// A member may itself be a fan-out point; its own tail comes first and
    /// the inherited tail is appended after it.
    pub fn nested(&self, member: &ResourceId) -> Self {
        let inner = Self::parse(member);
        let tail = match (inner.tail, &self.tail) {
            (Some(own), Some(inherited)) => Some(format!("{own}/{inherited}")),
            (own, inherited) => own.or_else(|| inherited.clone()),
        };
        Self {
            group: inner.group,
            tail,
        }
    }

    /// Where the sub-request for `member` goes.
    pub fn member_target(&self, member: &ResourceId) -> ResourceId {
        match &self.tail {
            Some(tail) => member.join(tail),
            None => member.clone(),
        }
    }
}
