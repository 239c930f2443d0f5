//! Job processing: branch verification and pickme conflict testing.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use pushcheck_git::{self as git, MergeSource, MirrorOps};
use tracing::{debug, error, info, info_span, warn};

use crate::conflicts::{self, SiblingConflict};
use crate::error::{Error, Result};
use crate::job::Job;
use crate::outcome::{Outcome, VerifyFailure};
use crate::queue::{JobHandler, JobSender};
use crate::request::{PushId, PushRequest, RequestId, RequestUpdate, Revision};
use crate::store::is_live;
use crate::tags::{CONFLICT_MASTER, CONFLICT_PICKME, GIT_ERROR, GIT_OK, TagSet};
use crate::traits::{Notifier, RequestStore};

/// Settings fixed for the lifetime of the worker.
#[derive(Debug, Clone, Default)]
pub struct ProcessorSettings {
    /// Requests carrying any of these tags are never verified.
    pub excluded_tags: TagSet,
    /// Bound on the already-in-main commit cache.
    pub sha_cache_limit: usize,
}

/// What a pickme conflict test found.
enum Verdict {
    MasterConflict(String),
    Siblings(Vec<SiblingConflict>),
}

/// Processes queue jobs against the store, the mirror and the notifier.
///
/// The mirror sits behind a mutex that is held for the whole of a job, so
/// no two jobs can ever interleave on it.
pub struct JobProcessor<S, M, N> {
    store: S,
    mirror: Mutex<M>,
    notifier: N,
    queue: JobSender,
    settings: ProcessorSettings,
    in_main: Mutex<HashSet<String>>,
}

impl<S, M, N> JobProcessor<S, M, N>
where
    S: RequestStore,
    M: MirrorOps + Send,
    N: Notifier,
{
    pub fn new(
        store: S,
        mirror: M,
        notifier: N,
        queue: JobSender,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            store,
            mirror: Mutex::new(mirror),
            notifier,
            queue,
            settings,
            in_main: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    fn lock_mirror(&self) -> MutexGuard<'_, M> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn mirror(&self) -> MutexGuard<'_, M> {
        self.lock_mirror()
    }

    /// Run one job, logging rather than returning any failure.
    pub fn process(&self, job: Job) {
        let span = info_span!("job", kind = %job.kind(), id = job.target());
        let _guard = span.enter();

        debug!("processing job");
        if let Err(e) = self.run(job) {
            error!(error = %e, details = ?e, "job failed; dropped");
        }
    }

    /// Run one job.
    ///
    /// # Errors
    /// Returns any failure not already turned into a notification.
    pub fn run(&self, job: Job) -> Result<()> {
        match job {
            Job::VerifyBranch { request } => self.verify_branch(request),
            Job::TestPickmeConflict {
                request,
                no_requeue,
            } => self.test_pickme_conflict(request, no_requeue),
            Job::TestAllPickmes { push } => self.fan_out(push, false),
            Job::TestConflictingPickmes { push } => self.fan_out(push, true),
        }
    }

    // === VERIFY_BRANCH ===

    fn verify_branch(&self, id: RequestId) -> Result<()> {
        let Some(request) = self.store.get_request(id)? else {
            error!(request = %id, "verify job for unknown request; dropped");
            return Ok(());
        };

        if request.tags.intersects(&self.settings.excluded_tags) {
            debug!(request = %id, tags = %request.tags, "request excluded from verification");
            return Ok(());
        }

        let checked = {
            let mirror = self.lock_mirror();
            self.check_branch(&*mirror, &request)?
        };

        match checked {
            Ok(revision) => {
                let update = RequestUpdate::default()
                    .revision(revision)
                    .tags(request.tags.clone().with(GIT_OK).without(GIT_ERROR));
                match self.store.update_request(id, &update)? {
                    Some(updated) => {
                        info!(request = %id, revision = %updated.revision, "branch verified");
                        self.notifier.notify(&updated, &Outcome::Verified);
                    }
                    None => error!(request = %id, "request vanished before its revision was recorded"),
                }
            }
            Err(failure) => {
                warn!(request = %id, reason = %failure, "branch verification failed");
                let update = RequestUpdate::default()
                    .tags(request.tags.clone().with(GIT_ERROR).without(GIT_OK));
                match self.store.update_request(id, &update)? {
                    Some(updated) => self
                        .notifier
                        .notify(&updated, &Outcome::VerifyFailed(failure)),
                    None => error!(request = %id, "request vanished before its failure was recorded"),
                }
            }
        }
        Ok(())
    }

    /// Bring the mirror up to date, then resolve the request's branch to a
    /// revision no other live request holds. The outer `Result` is for
    /// store failures only.
    fn check_branch(
        &self,
        mirror: &M,
        request: &PushRequest,
    ) -> Result<std::result::Result<Revision, VerifyFailure>> {
        if request.branch.trim().is_empty() {
            return Ok(Err(VerifyFailure::NoBranch));
        }

        let resolved = mirror
            .ensure(mirror.main_repository(), mirror.main_branch())
            .and_then(|()| mirror.resolve_branch(&request.repo, &request.branch));
        let sha = match resolved {
            Ok(sha) => sha,
            Err(git::Error::BranchNotFound { remote, branch }) => {
                return Ok(Err(VerifyFailure::BranchNotFound {
                    repo: remote,
                    branch,
                }));
            }
            Err(git::Error::StaleSubmodule { path }) => {
                return Ok(Err(VerifyFailure::StaleSubmodule { path }));
            }
            Err(e) => {
                return Ok(Err(VerifyFailure::Lookup {
                    detail: e.stderr(),
                }));
            }
        };

        let Ok(revision) = Revision::parse(&sha) else {
            return Ok(Err(VerifyFailure::Lookup {
                detail: format!("unexpected revision '{sha}'"),
            }));
        };

        if let Some(other) = self.store.get_request_by_revision(&revision, request.id)? {
            return Ok(Err(VerifyFailure::DuplicateRevision { other: other.id }));
        }
        Ok(Ok(revision))
    }

    // === TEST_PICKME_CONFLICT ===

    fn test_pickme_conflict(&self, id: RequestId, no_requeue: bool) -> Result<()> {
        let Some(request) = self.store.get_request(id)? else {
            error!(request = %id, "conflict test for unknown request; dropped");
            return Ok(());
        };
        let Some(push) = self.store.get_push_for_request(id)? else {
            warn!(request = %id, "request is not in a push; nothing to test against");
            return Ok(());
        };

        let guard = self.lock_mirror();
        let mirror = &*guard;

        mirror.ensure(&request.repo, &request.branch)?;
        mirror.ensure(mirror.main_repository(), mirror.main_branch())?;

        let head = match mirror.resolve_branch(&request.repo, &request.branch) {
            Ok(sha) => sha,
            Err(e) => {
                warn!(request = %id, error = %e, "pickme branch no longer resolves; skipping");
                return Ok(());
            }
        };
        if self.already_in_main(mirror, &head)? {
            info!(request = %id, head = %head, "pickme already in main; skipping");
            return Ok(());
        }

        let cleared = RequestUpdate::default()
            .tags(
                request
                    .tags
                    .clone()
                    .without(CONFLICT_MASTER)
                    .without(CONFLICT_PICKME),
            )
            .conflicts("");
        let Some(request) = self.store.update_request(id, &cleared)? else {
            return Err(Error::UpdateFailed(id));
        };

        let test_branch = format!("pickme_test_{push}_{id}");
        let source = merge_source(&request);
        let verdict = mirror.with_test_branch(&test_branch, |m| {
            match m.try_merge(&test_branch, &source, |m| {
                self.merge_siblings(m, &request, push, &test_branch, no_requeue)
            }) {
                Ok(siblings) => siblings.map(Verdict::Siblings),
                Err(e) if e.is_git_failure() => Ok(Verdict::MasterConflict(merge_output(&e))),
                Err(e) => Err(Error::from(e)),
            }
        })??;
        drop(guard);

        match verdict {
            Verdict::MasterConflict(output) => {
                info!(request = %id, "pickme conflicts with master");
                let update = RequestUpdate::default()
                    .tags(request.tags.clone().with(CONFLICT_MASTER))
                    .conflicts(conflicts::master_conflict(&output));
                self.record_conflict(id, &update, &Outcome::MasterConflict)
            }
            Verdict::Siblings(found) if found.is_empty() => {
                debug!(request = %id, "pickme merges cleanly");
                Ok(())
            }
            Verdict::Siblings(found) => {
                info!(request = %id, conflicts = found.len(), "pickme conflicts with other pickmes");
                let update = RequestUpdate::default()
                    .tags(request.tags.clone().with(CONFLICT_PICKME))
                    .conflicts(conflicts::pickme_conflicts(&found));
                self.record_conflict(id, &update, &Outcome::PickmeConflict)
            }
        }
    }

    /// Merge every other pickme of the push on top of the one under test,
    /// collecting those that fail.
    fn merge_siblings(
        &self,
        mirror: &M,
        request: &PushRequest,
        push: PushId,
        onto: &str,
        no_requeue: bool,
    ) -> Result<Vec<SiblingConflict>> {
        let mut found = Vec::new();

        for sibling_id in self.store.get_request_ids_in_push(push)? {
            if sibling_id == request.id {
                continue;
            }
            let Some(sibling) = self.store.get_request(sibling_id)? else {
                warn!(push = %push, sibling = %sibling_id, "push lists unknown request");
                continue;
            };
            if !is_live(&sibling) || sibling.tags.contains(CONFLICT_MASTER) {
                debug!(sibling = %sibling_id, "not a useful comparison; skipping");
                continue;
            }

            if let Err(e) = mirror.fetch(&sibling.repo, &sibling.branch) {
                warn!(sibling = %sibling_id, error = %e, "could not fetch sibling; skipping");
                continue;
            }
            match mirror.resolve_branch(&sibling.repo, &sibling.branch) {
                Ok(sha) if self.already_in_main(mirror, &sha)? => {
                    debug!(sibling = %sibling_id, "sibling already in main; skipping");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(sibling = %sibling_id, error = %e, "sibling branch does not resolve; skipping");
                    continue;
                }
            }

            match mirror.try_merge(onto, &merge_source(&sibling), |_| ()) {
                Ok(()) => debug!(sibling = %sibling_id, "sibling merges cleanly"),
                Err(e) if e.is_git_failure() => {
                    info!(request = %request.id, sibling = %sibling_id, "conflicting pickmes");
                    if !no_requeue {
                        self.queue.enqueue(Job::TestPickmeConflict {
                            request: sibling_id,
                            no_requeue: true,
                        });
                    }
                    found.push(SiblingConflict {
                        id: sibling_id,
                        title: sibling.title.clone(),
                        stdout: e.stdout(),
                        stderr: e.stderr(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(found)
    }

    fn record_conflict(&self, id: RequestId, update: &RequestUpdate, outcome: &Outcome) -> Result<()> {
        let Some(updated) = self.store.update_request(id, update)? else {
            return Err(Error::UpdateFailed(id));
        };
        self.notifier.notify(&updated, outcome);
        Ok(())
    }

    /// Whether `sha` is already in the main branch. Only positive answers
    /// are cached; the cache is cleared once it reaches its bound.
    fn already_in_main(&self, mirror: &M, sha: &str) -> Result<bool> {
        if self
            .in_main
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(sha)
        {
            return Ok(true);
        }

        let found = mirror.is_in_main(sha)?;
        if found {
            let mut cache = self.in_main.lock().unwrap_or_else(PoisonError::into_inner);
            if cache.len() >= self.settings.sha_cache_limit {
                cache.clear();
            }
            cache.insert(sha.to_string());
        }
        Ok(found)
    }

    // === TEST_ALL_PICKMES / TEST_CONFLICTING_PICKMES ===

    fn fan_out(&self, push: PushId, only_conflicting: bool) -> Result<()> {
        let mut queued = 0usize;
        for id in self.store.get_request_ids_in_push(push)? {
            if only_conflicting {
                let conflicting = self
                    .store
                    .get_request(id)?
                    .is_some_and(|r| r.tags.contains(CONFLICT_PICKME));
                if !conflicting {
                    continue;
                }
            }
            self.queue.enqueue(Job::TestPickmeConflict {
                request: id,
                no_requeue: only_conflicting,
            });
            queued += 1;
        }
        debug!(push = %push, queued, "queued pickme conflict tests");
        Ok(())
    }
}

impl<S, M, N> JobHandler for JobProcessor<S, M, N>
where
    S: RequestStore + 'static,
    M: MirrorOps + Send + 'static,
    N: Notifier + 'static,
{
    fn handle(&self, job: Job) {
        self.process(job);
    }
}

fn merge_source(request: &PushRequest) -> MergeSource<'_> {
    MergeSource {
        repo: &request.repo,
        branch: &request.branch,
        title: &request.title,
        author: &request.user,
    }
}

/// Text to show for a failed merge onto the main branch.
fn merge_output(e: &git::Error) -> String {
    let stdout = e.stdout();
    if stdout.trim().is_empty() {
        e.stderr()
    } else {
        stdout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::queue::GitQueue;
    use crate::request::{Push, RequestState};
    use crate::store::MemoryStore;
    use crate::test_mocks::{MockMirror, RecordingNotifier};

    const SHA_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const SHA_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const SHA_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    type Processor = JobProcessor<Arc<MemoryStore>, MockMirror, Arc<RecordingNotifier>>;

    struct Harness {
        queue: GitQueue,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        processor: Processor,
    }

    impl Harness {
        fn request(&self, id: u64) -> PushRequest {
            self.store.get_request(RequestId(id)).unwrap().unwrap()
        }

        fn set_tags(&self, id: u64, tags: &str) {
            let mut req = self.request(id);
            req.tags = TagSet::parse(tags);
            self.store.insert_request(req);
        }
    }

    /// R1 (alice, main/fix-a) and R2 (bob, bob/fix-b) both in push 10.
    fn harness(mirror: MockMirror, excluded: &[&str]) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.insert_request(PushRequest::new(RequestId(1), "alice", "Fix A", "main", "fix-a"));
        store.insert_request(PushRequest::new(RequestId(2), "bob", "Fix B", "bob", "fix-b"));
        store.insert_push(Push {
            id: PushId(10),
            title: "Push".into(),
            requests: vec![RequestId(1), RequestId(2)],
        });

        let queue = GitQueue::new(Duration::ZERO);
        let notifier = Arc::new(RecordingNotifier::default());
        let processor = JobProcessor::new(
            Arc::clone(&store),
            mirror,
            Arc::clone(&notifier),
            queue.sender(),
            ProcessorSettings {
                excluded_tags: excluded.iter().copied().collect(),
                sha_cache_limit: 16,
            },
        );
        Harness {
            queue,
            store,
            notifier,
            processor,
        }
    }

    fn branches() -> MockMirror {
        MockMirror::new()
            .with_branch("main", "fix-a", SHA_A)
            .with_branch("bob", "fix-b", SHA_B)
    }

    fn verify(h: &Harness, id: u64) {
        h.processor.run(Job::VerifyBranch {
            request: RequestId(id),
        })
        .unwrap();
    }

    fn test_pickme(h: &Harness, id: u64, no_requeue: bool) {
        h.processor
            .run(Job::TestPickmeConflict {
                request: RequestId(id),
                no_requeue,
            })
            .unwrap();
    }

    // === VERIFY_BRANCH ===

    #[test]
    fn test_verify_success_records_revision() {
        let h = harness(branches(), &[]);
        h.set_tags(1, "git-error,urgent");

        verify(&h, 1);

        let req = h.request(1);
        assert_eq!(req.revision.as_str(), SHA_A);
        assert_eq!(req.tags.to_string(), "git-ok,urgent");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Outcome::Verified);
        assert_eq!(sent[0].0.revision.as_str(), SHA_A);
    }

    #[test]
    fn test_excluded_request_is_untouched() {
        let h = harness(branches(), &["no-verify", "buildbot"]);
        h.set_tags(1, "buildbot");
        let before = h.request(1);

        verify(&h, 1);

        assert_eq!(h.request(1), before);
        assert!(h.notifier.sent().is_empty());
    }

    #[test]
    fn test_missing_branch_fails_verification() {
        let h = harness(MockMirror::new(), &[]);
        h.set_tags(1, "git-ok");

        verify(&h, 1);

        let req = h.request(1);
        assert!(req.tags.contains(GIT_ERROR));
        assert!(!req.tags.contains(GIT_OK));
        assert!(!req.revision.is_resolved());

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.user, "alice");
        assert_eq!(
            sent[0].1,
            Outcome::VerifyFailed(VerifyFailure::BranchNotFound {
                repo: "main".into(),
                branch: "fix-a".into()
            })
        );
    }

    #[test]
    fn test_empty_branch_fails_verification() {
        let h = harness(branches(), &[]);
        let mut req = h.request(1);
        req.branch = String::new();
        h.store.insert_request(req);

        verify(&h, 1);

        assert!(h.request(1).tags.contains(GIT_ERROR));
        assert_eq!(
            h.notifier.sent()[0].1,
            Outcome::VerifyFailed(VerifyFailure::NoBranch)
        );
    }

    #[test]
    fn test_lookup_failure_carries_stderr() {
        let h = harness(branches().with_lookup_failure(), &[]);

        verify(&h, 1);

        assert!(h.request(1).tags.contains(GIT_ERROR));
        match &h.notifier.sent()[0].1 {
            Outcome::VerifyFailed(VerifyFailure::Lookup { detail }) => {
                assert!(detail.contains("unable to access"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_stale_submodule_fails_verification() {
        let h = harness(branches().with_stale_submodule("vendor/lib"), &[]);
        h.set_tags(1, "git-ok");

        verify(&h, 1);

        let req = h.request(1);
        assert!(req.tags.contains(GIT_ERROR));
        assert!(!req.tags.contains(GIT_OK));
        assert!(!req.revision.is_resolved());
        assert_eq!(
            h.notifier.sent()[0].1,
            Outcome::VerifyFailed(VerifyFailure::StaleSubmodule {
                path: "vendor/lib".into()
            })
        );
    }

    #[test]
    fn test_mirror_refresh_failure_fails_verification() {
        let h = harness(branches().with_ensure_failure(), &[]);

        verify(&h, 1);

        assert!(h.request(1).tags.contains(GIT_ERROR));
        assert!(matches!(
            h.notifier.sent()[0].1,
            Outcome::VerifyFailed(VerifyFailure::Lookup { .. })
        ));
    }

    #[test]
    fn test_duplicate_revision_is_rejected() {
        let h = harness(branches().with_branch("bob", "fix-b", SHA_A), &[]);
        let mut first = h.request(1);
        first.revision = Revision::parse(SHA_A).unwrap();
        first.state = RequestState::Pickme;
        h.store.insert_request(first);

        verify(&h, 2);

        let req = h.request(2);
        assert!(req.tags.contains(GIT_ERROR));
        assert!(!req.tags.contains(GIT_OK));
        assert!(!req.revision.is_resolved());
        assert_eq!(
            h.notifier.sent()[0].1,
            Outcome::VerifyFailed(VerifyFailure::DuplicateRevision {
                other: RequestId(1)
            })
        );
    }

    #[test]
    fn test_discarded_duplicate_is_not_an_error() {
        let h = harness(branches().with_branch("bob", "fix-b", SHA_A), &[]);
        let mut first = h.request(1);
        first.revision = Revision::parse(SHA_A).unwrap();
        first.state = RequestState::Discarded;
        h.store.insert_request(first);

        verify(&h, 2);

        let req = h.request(2);
        assert!(req.tags.contains(GIT_OK));
        assert_eq!(req.revision.as_str(), SHA_A);
    }

    #[test]
    fn test_live_duplicate_behind_discarded_one_is_rejected() {
        let h = harness(branches().with_branch("main", "fix-c", SHA_A), &[]);
        let mut discarded = h.request(1);
        discarded.revision = Revision::parse(SHA_A).unwrap();
        discarded.state = RequestState::Discarded;
        h.store.insert_request(discarded);
        let mut live = h.request(2);
        live.revision = Revision::parse(SHA_A).unwrap();
        live.state = RequestState::Pickme;
        h.store.insert_request(live);
        h.store
            .insert_request(PushRequest::new(RequestId(3), "carol", "Fix C", "main", "fix-c"));

        verify(&h, 3);

        let req = h.request(3);
        assert!(req.tags.contains(GIT_ERROR));
        assert!(!req.revision.is_resolved());
        assert_eq!(
            h.notifier.sent()[0].1,
            Outcome::VerifyFailed(VerifyFailure::DuplicateRevision {
                other: RequestId(2)
            })
        );
    }

    #[test]
    fn test_reverifying_same_request_is_not_a_duplicate() {
        let h = harness(branches(), &[]);
        verify(&h, 1);
        verify(&h, 1);

        assert!(h.request(1).tags.contains(GIT_OK));
        assert!(h.notifier.sent().iter().all(|(_, o)| *o == Outcome::Verified));
    }

    #[test]
    fn test_unknown_request_is_dropped() {
        let h = harness(branches(), &[]);
        verify(&h, 99);
        assert!(h.notifier.sent().is_empty());
    }

    // === TEST_PICKME_CONFLICT ===

    #[test]
    fn test_conflicting_pickmes() {
        let h = harness(branches().with_pair_conflict("fix-a", "fix-b"), &[]);

        test_pickme(&h, 1, false);

        let req = h.request(1);
        assert!(req.tags.contains(CONFLICT_PICKME));
        assert!(!req.tags.contains(CONFLICT_MASTER));
        assert!(req.conflicts.contains("Fix B"));
        assert!(req.conflicts.contains("/request?id=2"));

        assert_eq!(
            h.queue.take_pending(),
            vec![Job::TestPickmeConflict {
                request: RequestId(2),
                no_requeue: true
            }]
        );

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Outcome::PickmeConflict);

        let mirror = h.processor.mirror();
        assert_eq!(*mirror.test_branches.borrow(), vec!["pickme_test_10_1"]);
        assert_eq!(*mirror.merge_attempts.borrow(), vec!["fix-a", "fix-b"]);
    }

    #[test]
    fn test_requeued_job_does_not_requeue() {
        let h = harness(branches().with_pair_conflict("fix-a", "fix-b"), &[]);

        test_pickme(&h, 2, true);

        let req = h.request(2);
        assert!(req.tags.contains(CONFLICT_PICKME));
        assert!(req.conflicts.contains("Fix A"));
        assert!(h.queue.take_pending().is_empty());
    }

    #[test]
    fn test_master_conflict_short_circuits() {
        let h = harness(
            branches()
                .with_master_conflict("fix-a")
                .with_pair_conflict("fix-a", "fix-b"),
            &[],
        );

        test_pickme(&h, 1, false);

        let req = h.request(1);
        assert_eq!(req.tags.to_string(), CONFLICT_MASTER);
        assert!(req.conflicts.starts_with("<strong>Conflict with master:</strong>"));
        assert!(req.conflicts.contains("CONFLICT (content)"));
        assert_eq!(*h.processor.mirror().merge_attempts.borrow(), vec!["fix-a"]);
        assert!(h.queue.take_pending().is_empty());
        assert_eq!(h.notifier.sent()[0].1, Outcome::MasterConflict);
    }

    #[test]
    fn test_rerun_starts_from_clean_slate() {
        let h = harness(branches(), &[]);
        let mut req = h.request(1);
        req.tags = TagSet::parse("conflict-pickme,urgent");
        req.conflicts = "<strong>stale</strong>".into();
        h.store.insert_request(req);

        test_pickme(&h, 1, false);

        let req = h.request(1);
        assert_eq!(req.tags.to_string(), "urgent");
        assert!(req.conflicts.is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[test]
    fn test_mirror_is_restored_after_every_outcome() {
        for mirror in [
            branches(),
            branches().with_master_conflict("fix-a"),
            branches().with_pair_conflict("fix-a", "fix-b"),
        ] {
            let h = harness(mirror, &[]);
            test_pickme(&h, 1, false);

            let mirror = h.processor.mirror();
            assert_eq!(*mirror.head.borrow(), MockMirror::HEAD);
            assert!(mirror.merged.borrow().is_empty());
        }
    }

    #[test]
    fn test_master_conflicted_sibling_is_skipped() {
        let h = harness(branches().with_pair_conflict("fix-a", "fix-b"), &[]);
        h.set_tags(2, "conflict-master");

        test_pickme(&h, 1, false);

        assert!(h.request(1).tags.is_empty());
        assert_eq!(*h.processor.mirror().merge_attempts.borrow(), vec!["fix-a"]);
    }

    #[test]
    fn test_discarded_sibling_is_skipped() {
        let h = harness(branches().with_pair_conflict("fix-a", "fix-b"), &[]);
        let mut sibling = h.request(2);
        sibling.state = RequestState::Discarded;
        h.store.insert_request(sibling);

        test_pickme(&h, 1, false);
        assert!(!h.request(1).tags.contains(CONFLICT_PICKME));
    }

    #[test]
    fn test_sibling_already_in_main_is_skipped() {
        let h = harness(
            branches()
                .with_pair_conflict("fix-a", "fix-b")
                .with_in_main(SHA_B),
            &[],
        );

        test_pickme(&h, 1, false);

        assert!(!h.request(1).tags.contains(CONFLICT_PICKME));
        assert_eq!(*h.processor.mirror().merge_attempts.borrow(), vec!["fix-a"]);
    }

    #[test]
    fn test_pickme_already_in_main_is_skipped_and_cached() {
        let h = harness(branches().with_in_main(SHA_A), &[]);
        h.set_tags(1, "conflict-pickme");

        test_pickme(&h, 1, false);
        test_pickme(&h, 1, false);

        // Skipped before the clean slate, so old markers stay.
        assert!(h.request(1).tags.contains(CONFLICT_PICKME));
        let mirror = h.processor.mirror();
        assert!(mirror.test_branches.borrow().is_empty());
        assert_eq!(*mirror.is_in_main_calls.borrow(), 1);
    }

    #[test]
    fn test_unreachable_pickme_is_skipped() {
        let h = harness(MockMirror::new().with_branch("bob", "fix-b", SHA_B), &[]);
        h.set_tags(1, "git-ok");

        test_pickme(&h, 1, false);

        assert_eq!(h.request(1).tags.to_string(), GIT_OK);
        assert!(h.processor.mirror().test_branches.borrow().is_empty());
    }

    #[test]
    fn test_request_outside_push_is_skipped() {
        let h = harness(branches(), &[]);
        h.store.insert_request(PushRequest::new(RequestId(3), "carol", "Fix C", "carol", "fix-c"));

        test_pickme(&h, 3, false);
        assert!(h.processor.mirror().test_branches.borrow().is_empty());
    }

    #[test]
    fn test_mirror_failure_fails_the_job() {
        let h = harness(branches().with_ensure_failure(), &[]);
        let result = h.processor.run(Job::TestPickmeConflict {
            request: RequestId(1),
            no_requeue: false,
        });
        assert!(matches!(result, Err(Error::Git(_))));

        // process() swallows it.
        h.processor.process(Job::TestPickmeConflict {
            request: RequestId(1),
            no_requeue: false,
        });
        assert!(h.notifier.sent().is_empty());
    }

    // === Fan-out ===

    #[test]
    fn test_all_pickmes_fans_out() {
        let h = harness(branches(), &[]);
        h.processor
            .run(Job::TestAllPickmes { push: PushId(10) })
            .unwrap();

        assert_eq!(
            h.queue.take_pending(),
            vec![
                Job::TestPickmeConflict {
                    request: RequestId(1),
                    no_requeue: false
                },
                Job::TestPickmeConflict {
                    request: RequestId(2),
                    no_requeue: false
                },
            ]
        );
    }

    #[test]
    fn test_conflicting_pickmes_only_requeues_conflicts() {
        let h = harness(branches(), &[]);
        h.set_tags(2, "conflict-pickme");

        h.processor
            .run(Job::TestConflictingPickmes { push: PushId(10) })
            .unwrap();

        assert_eq!(
            h.queue.take_pending(),
            vec![Job::TestPickmeConflict {
                request: RequestId(2),
                no_requeue: true
            }]
        );
    }

    #[test]
    fn test_three_way_conflict_lists_both_siblings() {
        let h = harness(
            branches()
                .with_branch("carol", "fix-c", SHA_C)
                .with_pair_conflict("fix-a", "fix-b")
                .with_pair_conflict("fix-a", "fix-c"),
            &[],
        );
        h.store.insert_request(PushRequest::new(RequestId(3), "carol", "Fix C", "carol", "fix-c"));
        h.store.insert_push(Push {
            id: PushId(10),
            title: "Push".into(),
            requests: vec![RequestId(1), RequestId(2), RequestId(3)],
        });

        test_pickme(&h, 1, false);

        let req = h.request(1);
        assert!(req.conflicts.contains("Fix B"));
        assert!(req.conflicts.contains("Fix C"));
        assert_eq!(h.queue.take_pending().len(), 2);
    }
}
