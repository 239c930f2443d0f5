//! Mock implementations for testing the job processor.
//!
//! These mocks implement the traits from pushcheck-git and pushcheck-core
//! to enable unit testing of queue logic without real git repositories.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use pushcheck_git::{Error as GitError, MergeSource, MirrorOps, Result as GitResult};

use crate::outcome::Outcome;
use crate::request::PushRequest;
use crate::traits::Notifier;

/// Mock implementation of `MirrorOps`.
///
/// Branches are keyed by `(repo, branch)`. A merge fails when the branch
/// is listed as conflicting with master, or when it conflicts with a branch
/// already merged on the current test branch.
pub struct MockMirror {
    pub branches: RefCell<HashMap<(String, String), String>>,
    pub in_main: RefCell<HashSet<String>>,
    pub master_conflicts: RefCell<HashSet<String>>,
    pub pair_conflicts: RefCell<Vec<(String, String)>>,
    pub lookup_fails: RefCell<bool>,
    pub ensure_fails: RefCell<bool>,
    pub stale_submodule: RefCell<Option<String>>,

    pub head: RefCell<String>,
    pub merged: RefCell<Vec<String>>,
    pub merge_attempts: RefCell<Vec<String>>,
    pub test_branches: RefCell<Vec<String>>,
    pub is_in_main_calls: RefCell<usize>,
}

impl Default for MockMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMirror {
    pub const HEAD: &'static str = "detached-master";

    pub fn new() -> Self {
        Self {
            branches: RefCell::new(HashMap::new()),
            in_main: RefCell::new(HashSet::new()),
            master_conflicts: RefCell::new(HashSet::new()),
            pair_conflicts: RefCell::new(Vec::new()),
            lookup_fails: RefCell::new(false),
            ensure_fails: RefCell::new(false),
            stale_submodule: RefCell::new(None),
            head: RefCell::new(Self::HEAD.to_string()),
            merged: RefCell::new(Vec::new()),
            merge_attempts: RefCell::new(Vec::new()),
            test_branches: RefCell::new(Vec::new()),
            is_in_main_calls: RefCell::new(0),
        }
    }

    pub fn with_branch(self, repo: &str, branch: &str, sha: &str) -> Self {
        self.branches
            .borrow_mut()
            .insert((repo.to_string(), branch.to_string()), sha.to_string());
        self
    }

    pub fn with_in_main(self, sha: &str) -> Self {
        self.in_main.borrow_mut().insert(sha.to_string());
        self
    }

    pub fn with_master_conflict(self, branch: &str) -> Self {
        self.master_conflicts.borrow_mut().insert(branch.to_string());
        self
    }

    pub fn with_pair_conflict(self, a: &str, b: &str) -> Self {
        self.pair_conflicts
            .borrow_mut()
            .push((a.to_string(), b.to_string()));
        self
    }

    pub fn with_lookup_failure(self) -> Self {
        *self.lookup_fails.borrow_mut() = true;
        self
    }

    pub fn with_ensure_failure(self) -> Self {
        *self.ensure_fails.borrow_mut() = true;
        self
    }

    pub fn with_stale_submodule(self, path: &str) -> Self {
        *self.stale_submodule.borrow_mut() = Some(path.to_string());
        self
    }

    fn conflicts_with_merged(&self, branch: &str) -> bool {
        let merged = self.merged.borrow();
        self.pair_conflicts.borrow().iter().any(|(a, b)| {
            (a == branch && merged.contains(b)) || (b == branch && merged.contains(a))
        })
    }
}

fn conflict(branch: &str) -> GitError {
    GitError::Command {
        args: format!("pull --no-ff --no-commit --no-rebase origin {branch}"),
        code: 1,
        stdout: format!("CONFLICT (content): Merge conflict in {branch}.txt\n"),
        stderr: "Automatic merge failed; fix conflicts and then commit the result.\n".into(),
        cwd: None,
    }
}

impl MirrorOps for MockMirror {
    fn main_repository(&self) -> &str {
        "main"
    }

    fn main_branch(&self) -> &str {
        "master"
    }

    fn ensure(&self, _repo: &str, _branch: &str) -> GitResult<()> {
        if let Some(path) = self.stale_submodule.borrow().clone() {
            return Err(GitError::StaleSubmodule { path });
        }
        if *self.ensure_fails.borrow() {
            return Err(GitError::Timeout {
                args: "fetch --all --prune".into(),
                timeout: std::time::Duration::from_secs(1),
                cwd: None,
            });
        }
        Ok(())
    }

    fn fetch(&self, _repo: &str, _branch: &str) -> GitResult<()> {
        Ok(())
    }

    fn resolve_branch(&self, repo: &str, branch: &str) -> GitResult<String> {
        if *self.lookup_fails.borrow() {
            return Err(GitError::Command {
                args: "ls-remote --heads".into(),
                code: 128,
                stdout: String::new(),
                stderr: "fatal: unable to access remote\n".into(),
                cwd: None,
            });
        }
        self.branches
            .borrow()
            .get(&(repo.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| GitError::BranchNotFound {
                remote: repo.to_string(),
                branch: branch.to_string(),
            })
    }

    fn is_in_main(&self, sha: &str) -> GitResult<bool> {
        *self.is_in_main_calls.borrow_mut() += 1;
        Ok(self.in_main.borrow().contains(sha))
    }

    fn with_test_branch<T>(&self, name: &str, body: impl FnOnce(&Self) -> T) -> GitResult<T> {
        self.test_branches.borrow_mut().push(name.to_string());
        let previous = self.head.replace(name.to_string());
        let out = body(self);
        *self.head.borrow_mut() = previous;
        Ok(out)
    }

    fn try_merge<T>(
        &self,
        _onto: &str,
        source: &MergeSource<'_>,
        body: impl FnOnce(&Self) -> T,
    ) -> GitResult<T> {
        let branch = source.branch;
        self.merge_attempts.borrow_mut().push(branch.to_string());
        if self.master_conflicts.borrow().contains(branch) || self.conflicts_with_merged(branch) {
            return Err(conflict(branch));
        }

        self.merged.borrow_mut().push(branch.to_string());
        let out = body(self);
        self.merged.borrow_mut().pop();
        Ok(out)
    }
}

/// Notifier that remembers every notification.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(PushRequest, Outcome)>>,
}

impl RecordingNotifier {
    #[allow(clippy::unwrap_used)]
    pub fn sent(&self) -> Vec<(PushRequest, Outcome)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    #[allow(clippy::unwrap_used)]
    fn notify(&self, request: &PushRequest, outcome: &Outcome) {
        self.sent
            .lock()
            .unwrap()
            .push((request.clone(), outcome.clone()));
    }
}
