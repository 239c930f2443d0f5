//! Work items for the verification queue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::{PushId, RequestId};

/// The kinds of job the queue understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    VerifyBranch,
    TestPickmeConflict,
    TestAllPickmes,
    TestConflictingPickmes,
}

impl JobKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyBranch => "VERIFY_BRANCH",
            Self::TestPickmeConflict => "TEST_PICKME_CONFLICT",
            Self::TestAllPickmes => "TEST_ALL_PICKMES",
            Self::TestConflictingPickmes => "TEST_CONFLICTING_PICKMES",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra switches accepted by [`Job::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Do not re-enqueue conflicting siblings.
    pub no_requeue: bool,
}

/// One unit of work.
///
/// Serialized as `{"kind": "VERIFY_BRANCH", "request": 7}` and so on, which
/// is also the line format `pushcheck run` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Job {
    /// Resolve a request's branch and record its revision.
    VerifyBranch { request: RequestId },
    /// Test a pickme against the main branch and the rest of its push.
    TestPickmeConflict {
        request: RequestId,
        #[serde(default)]
        no_requeue: bool,
    },
    /// Enqueue a conflict test for every request in a push.
    TestAllPickmes { push: PushId },
    /// Re-test only the requests in a push currently tagged as conflicting.
    TestConflictingPickmes { push: PushId },
}

impl Job {
    /// Build a job from its kind and target id.
    #[must_use]
    pub const fn new(kind: JobKind, id: u64, options: JobOptions) -> Self {
        match kind {
            JobKind::VerifyBranch => Self::VerifyBranch {
                request: RequestId(id),
            },
            JobKind::TestPickmeConflict => Self::TestPickmeConflict {
                request: RequestId(id),
                no_requeue: options.no_requeue,
            },
            JobKind::TestAllPickmes => Self::TestAllPickmes { push: PushId(id) },
            JobKind::TestConflictingPickmes => Self::TestConflictingPickmes { push: PushId(id) },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::VerifyBranch { .. } => JobKind::VerifyBranch,
            Self::TestPickmeConflict { .. } => JobKind::TestPickmeConflict,
            Self::TestAllPickmes { .. } => JobKind::TestAllPickmes,
            Self::TestConflictingPickmes { .. } => JobKind::TestConflictingPickmes,
        }
    }

    /// The request or push id the job targets.
    #[must_use]
    pub const fn target(&self) -> u64 {
        match self {
            Self::VerifyBranch { request } | Self::TestPickmeConflict { request, .. } => request.0,
            Self::TestAllPickmes { push } | Self::TestConflictingPickmes { push } => push.0,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matches_kind() {
        let job = Job::new(
            JobKind::TestPickmeConflict,
            4,
            JobOptions { no_requeue: true },
        );
        assert_eq!(
            job,
            Job::TestPickmeConflict {
                request: RequestId(4),
                no_requeue: true
            }
        );
        assert_eq!(job.kind(), JobKind::TestPickmeConflict);
        assert_eq!(job.target(), 4);
        assert_eq!(job.to_string(), "TEST_PICKME_CONFLICT 4");
    }

    #[test]
    fn test_json_lines() {
        let job: Job = serde_json::from_str(r#"{"kind":"TEST_PICKME_CONFLICT","request":3}"#).unwrap();
        assert_eq!(
            job,
            Job::TestPickmeConflict {
                request: RequestId(3),
                no_requeue: false
            }
        );

        let job: Job = serde_json::from_str(r#"{"kind":"TEST_ALL_PICKMES","push":9}"#).unwrap();
        assert_eq!(job, Job::TestAllPickmes { push: PushId(9) });

        assert!(serde_json::from_str::<Job>(r#"{"kind":"DEPLOY","push":9}"#).is_err());
    }
}
