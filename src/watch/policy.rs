//! Refresh policies.
//!
//! Versioned secrets are compared against the last version seen for the path
//! and only published when the version went up. Leased credentials are always
//! published: a freshly issued credential has nothing to be compared with.

use std::time::Duration;

use crate::BackendError;
use crate::BackendKind;
use crate::RevisionHint;

/// What to do with a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDecision {
    /// Write the store and emit an event
    pub publish: bool,
    /// New last-seen version for the path
    pub record_version: Option<u64>,
    /// Delay from fetch completion until the next check
    pub next_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    Versioned { period: Duration },
    Leased,
}

impl RefreshPolicy {
    pub fn for_kind(
        kind: BackendKind,
        version_period: Duration,
    ) -> Self {
        match kind {
            BackendKind::Versioned => RefreshPolicy::Versioned { period: version_period },
            BackendKind::Leased => RefreshPolicy::Leased,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            RefreshPolicy::Versioned { .. } => BackendKind::Versioned,
            RefreshPolicy::Leased => BackendKind::Leased,
        }
    }

    /// Decides whether a fetch result is news and when to look again.
    ///
    /// `last_version` is only consulted by the versioned policy. A revision
    /// hint of the wrong kind, or a zero lease, is a malformed response.
    pub fn apply(
        &self,
        path: &str,
        hint: RevisionHint,
        last_version: Option<u64>,
    ) -> std::result::Result<RefreshDecision, BackendError> {
        match (self, hint) {
            (RefreshPolicy::Versioned { period }, RevisionHint::Version(version)) => {
                let newer = last_version.map_or(true, |last| version > last);
                Ok(RefreshDecision {
                    publish: newer,
                    record_version: newer.then_some(version),
                    next_interval: *period,
                })
            }
            (RefreshPolicy::Leased, RevisionHint::Lease(lease)) => {
                if lease.is_zero() {
                    return Err(BackendError::Malformed {
                        path: path.to_string(),
                        reason: "lease duration is zero".to_string(),
                    });
                }
                Ok(RefreshDecision {
                    publish: true,
                    record_version: None,
                    next_interval: lease,
                })
            }
            _ => Err(BackendError::UnexpectedHint {
                path: path.to_string(),
                expected: self.kind(),
            }),
        }
    }
}
