//! Trait abstraction over the shared mirror.
//!
//! The verification queue only talks to the mirror through [`MirrorOps`],
//! so its conflict algorithm can be tested without real repositories.

use crate::error::Result;
use crate::mirror::Mirror;
use crate::scope::{BranchScope, MergeScope, MergeSource};

/// Operations the verification queue performs on the mirror.
///
/// Scoped operations take a closure: the scope is entered before the
/// closure runs and released after it returns, so callers cannot forget the
/// release step.
#[allow(clippy::missing_errors_doc)]
pub trait MirrorOps {
    /// Name of the main repository.
    fn main_repository(&self) -> &str;

    /// Integration branch of the main repository.
    fn main_branch(&self) -> &str;

    /// Fetch and check out `branch` of `repo` (see [`Mirror::ensure`]).
    fn ensure(&self, repo: &str, branch: &str) -> Result<()>;

    /// Fetch `branch` of `repo` without touching the work tree.
    fn fetch(&self, repo: &str, branch: &str) -> Result<()>;

    /// Resolve the head commit of `branch` in `repo` on the server.
    fn resolve_branch(&self, repo: &str, branch: &str) -> Result<String>;

    /// Whether `sha` is already part of the main branch.
    fn is_in_main(&self, sha: &str) -> Result<bool>;

    /// Run `body` on a fresh test branch named `name`.
    fn with_test_branch<T>(&self, name: &str, body: impl FnOnce(&Self) -> T) -> Result<T>;

    /// Merge `source` onto `onto` and run `body` on the merged tree.
    ///
    /// Returns `Err` if the merge itself fails; `body`'s own outcome is
    /// returned inside `Ok`. The tree is rolled back in both cases.
    fn try_merge<T>(
        &self,
        onto: &str,
        source: &MergeSource<'_>,
        body: impl FnOnce(&Self) -> T,
    ) -> Result<T>;
}

impl MirrorOps for Mirror {
    fn main_repository(&self) -> &str {
        &self.config().layout.main_repository
    }

    fn main_branch(&self) -> &str {
        Self::main_branch(self)
    }

    fn ensure(&self, repo: &str, branch: &str) -> Result<()> {
        Self::ensure(self, repo, branch)
    }

    fn fetch(&self, repo: &str, branch: &str) -> Result<()> {
        Self::fetch(self, repo, branch)
    }

    fn resolve_branch(&self, repo: &str, branch: &str) -> Result<String> {
        Self::resolve_branch(self, repo, branch)
    }

    fn is_in_main(&self, sha: &str) -> Result<bool> {
        Self::is_in_main(self, sha)
    }

    fn with_test_branch<T>(&self, name: &str, body: impl FnOnce(&Self) -> T) -> Result<T> {
        let _scope = BranchScope::enter(self, name)?;
        Ok(body(self))
    }

    fn try_merge<T>(
        &self,
        onto: &str,
        source: &MergeSource<'_>,
        body: impl FnOnce(&Self) -> T,
    ) -> Result<T> {
        let _scope = MergeScope::enter(self, onto, source)?;
        Ok(body(self))
    }
}
