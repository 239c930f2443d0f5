//! What a finished job tells the requester.

use std::fmt;

use crate::request::RequestId;

/// Why a branch could not be verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// The request names no branch.
    NoBranch,
    /// The git server could not be queried.
    Lookup { detail: String },
    /// The branch does not exist on the server.
    BranchNotFound { repo: String, branch: String },
    /// Another live request already carries the same revision.
    DuplicateRevision { other: RequestId },
    /// A submodule did not match the recorded commit.
    StaleSubmodule { path: String },
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBranch => f.write_str("No branch specified"),
            Self::Lookup { detail } => write!(f, "Failed to look up branch: {}", detail.trim()),
            Self::BranchNotFound { repo, branch } => {
                write!(f, "Branch {branch} not found in repository {repo}")
            }
            Self::DuplicateRevision { other } => write!(
                f,
                "Another request with the same revision already exists (request {other})"
            ),
            Self::StaleSubmodule { path } => {
                write!(f, "Submodule {path} is not at the recorded commit")
            }
        }
    }
}

/// Result of a verification or conflict test, as reported to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Branch resolved to a unique revision.
    Verified,
    /// Branch could not be verified.
    VerifyFailed(VerifyFailure),
    /// Pickme does not merge onto the main branch.
    MasterConflict,
    /// Pickme conflicts with at least one other pickme in its push.
    PickmeConflict,
}

impl Outcome {
    /// Whether the outcome is a failure of any kind.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::Verified)
    }
}
