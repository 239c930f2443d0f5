//! Scoped test branches and speculative merges.
//!
//! Both scopes are guards: acquiring one changes the mirror, dropping it
//! puts the mirror back. Cleanup runs on every exit path, including early
//! returns and unwinding, because the mirror is reused by the next job.
//! Failures during cleanup cannot be returned from `Drop` and are logged.

use tracing::{debug, error};

use crate::error::Result;
use crate::mirror::{Head, Mirror};

/// A branch to merge, with the details used for the merge commit message.
#[derive(Debug, Clone, Copy)]
pub struct MergeSource<'a> {
    /// Repository the branch lives in (main repository or a developer repo).
    pub repo: &'a str,
    /// Branch name.
    pub branch: &'a str,
    /// Request title.
    pub title: &'a str,
    /// Request owner.
    pub author: &'a str,
}

impl MergeSource<'_> {
    /// Commit message for the speculative merge.
    #[must_use]
    pub fn commit_message(&self) -> String {
        format!(
            "{}\n\n(Merged from {}/{} for {})",
            self.title, self.repo, self.branch, self.author
        )
    }
}

/// A temporary branch tracking the main branch.
///
/// On drop, the previous HEAD is checked out again and the branch is
/// force-deleted.
#[derive(Debug)]
pub struct BranchScope<'a> {
    mirror: &'a Mirror,
    name: String,
    previous: Head,
}

impl<'a> BranchScope<'a> {
    /// Create and check out `name`, starting at the main branch.
    ///
    /// A leftover branch with the same name (from an interrupted run) is
    /// deleted first.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be recorded or the branch cannot be
    /// created.
    pub fn enter(mirror: &'a Mirror, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let previous = mirror.head()?;

        if mirror.git(["branch", "-D", name.as_str()]).is_ok() {
            debug!(branch = %name, "removed leftover test branch");
        }

        let main = mirror.main_ref();
        mirror.git(["checkout", "-b", name.as_str(), "--track", main.as_str()])?;
        debug!(branch = %name, "entered test branch");

        Ok(Self {
            mirror,
            name,
            previous,
        })
    }

    /// Name of the temporary branch.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for BranchScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mirror.checkout_head(&self.previous) {
            error!(branch = %self.name, error = %e, "failed to leave test branch");
            // Fall back to the main branch so the delete below can succeed.
            if let Err(e) = self.mirror.git(["checkout", "-f", self.mirror.main_branch()]) {
                error!(error = %e, "failed to check out main branch");
            }
        }
        if let Err(e) = self.mirror.git(["branch", "-D", self.name.as_str()]) {
            error!(branch = %self.name, error = %e, "failed to delete test branch");
        }
    }
}

/// A speculative merge onto the current checkout.
///
/// On drop, the checkout is hard-reset to the commit it was at before the
/// merge, whether or not the merge succeeded.
#[derive(Debug)]
pub struct MergeScope<'a> {
    mirror: &'a Mirror,
    restore_point: String,
}

impl<'a> MergeScope<'a> {
    /// Merge `source` onto `onto` (which must be checked out) with a real
    /// merge commit.
    ///
    /// Local hooks are skipped. After committing, submodules are refreshed
    /// and checked for staleness.
    ///
    /// # Errors
    /// Returns the failing step's error after the checkout has been reset to
    /// its restore point. A merge conflict surfaces as
    /// [`crate::Error::Command`] with git's output captured.
    pub fn enter(mirror: &'a Mirror, onto: &str, source: &MergeSource<'_>) -> Result<Self> {
        let restore_point = mirror.rev_parse(onto)?;
        let scope = Self {
            mirror,
            restore_point,
        };
        // Any error below drops `scope`, which performs the rollback.
        scope.merge(source)?;
        Ok(scope)
    }

    fn merge(&self, source: &MergeSource<'_>) -> Result<()> {
        let remote = self.mirror.config().layout.remote_name(source.repo);
        self.mirror.git([
            "pull",
            "--no-ff",
            "--no-commit",
            "--no-rebase",
            remote,
            source.branch,
        ])?;

        let message = source.commit_message();
        self.mirror
            .git(["commit", "-m", message.as_str(), "--no-verify"])?;

        self.mirror.update_submodules()?;
        self.mirror.check_submodules()
    }

    /// Commit the checkout is reset to on drop.
    #[must_use]
    pub fn restore_point(&self) -> &str {
        &self.restore_point
    }
}

impl Drop for MergeScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mirror.reset_to(&self.restore_point) {
            error!(
                restore_point = %self.restore_point,
                error = %e,
                "failed to roll back speculative merge"
            );
        }
    }
}
