//! The shared on-disk mirror of the main repository.
//!
//! There is exactly one clone per main-repository configuration. Developer
//! repositories are not cloned separately; they are registered as extra
//! remotes inside the same clone, so every branch any request names can be
//! merged against the main branch locally.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::command::{CommandOutput, GitCommand};
use crate::error::{Error, Result};
use crate::remote::{ORIGIN, RemoteLayout};
use crate::submodule;

/// Exit codes `git remote add` uses for "remote already exists"
/// (128 before git 2.30, 3 since).
const REMOTE_EXISTS_CODES: [i32; 2] = [3, 128];

/// Settings for the shared mirror.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Where repositories live on the git server.
    pub layout: RemoteLayout,
    /// Integration branch of the main repository.
    pub main_branch: String,
    /// Directory holding the mirror clone.
    pub local_repo_path: PathBuf,
    /// Optional local object store passed to `git clone --reference`.
    pub local_mirror: Option<PathBuf>,
    /// Wall-clock limit for each git invocation.
    pub command_timeout: Duration,
    /// Identity used for speculative merge commits.
    pub committer_name: String,
    /// Identity used for speculative merge commits.
    pub committer_email: String,
}

/// What HEAD pointed at, so it can be restored later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD is a symbolic ref to a local branch.
    Branch(String),
    /// HEAD is detached at a commit.
    Detached(String),
}

/// Handle to the shared mirror clone.
#[derive(Debug, Clone)]
pub struct Mirror {
    config: MirrorConfig,
    path: PathBuf,
}

impl Mirror {
    /// Create a handle; nothing touches the disk until first use.
    #[must_use]
    pub fn new(config: MirrorConfig) -> Self {
        let path = config
            .local_repo_path
            .join(&config.layout.main_repository);
        Self { config, path }
    }

    /// On-disk path of the clone.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mirror settings.
    #[must_use]
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Integration branch of the main repository.
    #[must_use]
    pub fn main_branch(&self) -> &str {
        &self.config.main_branch
    }

    /// Remote-tracking ref of the main branch, e.g. `origin/master`.
    #[must_use]
    pub fn main_ref(&self) -> String {
        format!("{ORIGIN}/{}", self.config.main_branch)
    }

    /// A git command with the mirror's identity and deadline applied, not yet
    /// bound to a directory.
    fn command<I, S>(&self, args: I) -> GitCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GitCommand::new(args)
            .env("GIT_AUTHOR_NAME", &self.config.committer_name)
            .env("GIT_AUTHOR_EMAIL", &self.config.committer_email)
            .env("GIT_COMMITTER_NAME", &self.config.committer_name)
            .env("GIT_COMMITTER_EMAIL", &self.config.committer_email)
            .timeout(self.config.command_timeout)
    }

    /// Run git inside the mirror.
    pub(crate) fn git<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(args).current_dir(&self.path).run()
    }

    // === Setup ===

    /// Clone the main repository if the mirror does not exist yet.
    ///
    /// # Errors
    /// Returns error if the parent directory cannot be created or the clone
    /// fails.
    pub fn ensure_cloned(&self) -> Result<()> {
        if self.path.is_dir() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut args = vec![
            "clone".to_string(),
            self.config.layout.url(&self.config.layout.main_repository),
        ];
        if let Some(reference) = self.config.local_mirror.as_ref().filter(|p| p.is_dir()) {
            args.push("--reference".into());
            args.push(reference.display().to_string());
        }
        args.push(self.path.display().to_string());

        info!(path = %self.path.display(), "cloning main repository");
        self.command(args).run()?;
        Ok(())
    }

    /// Register `repo` as a remote of the mirror.
    ///
    /// The main repository is always `origin` and needs no registration. An
    /// already registered remote is not an error.
    ///
    /// # Errors
    /// Returns any other failure of `git remote add`.
    pub fn add_remote(&self, repo: &str) -> Result<()> {
        if self.config.layout.is_main(repo) {
            return Ok(());
        }

        let url = self.config.layout.url(repo);
        match self.git(["remote", "add", repo, url.as_str()]) {
            Ok(_) => Ok(()),
            Err(Error::Command { code, stderr, .. })
                if REMOTE_EXISTS_CODES.contains(&code) && stderr.contains("already exists") =>
            {
                debug!(remote = repo, "remote already registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Make `branch` of `repo` available locally without touching the work
    /// tree.
    ///
    /// # Errors
    /// Returns error if cloning, remote registration or the fetch fails.
    pub fn fetch(&self, repo: &str, branch: &str) -> Result<()> {
        self.ensure_cloned()?;
        self.add_remote(repo)?;

        let remote = self.config.layout.remote_name(repo);
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}");
        self.git(["fetch", "--prune", remote, refspec.as_str()])?;
        Ok(())
    }

    /// Bring the mirror up to date and check out `branch` of `repo`.
    ///
    /// Clones on first use, registers the remote, fetches every remote with
    /// pruning, scrubs the work tree, checks out the remote-tracking ref,
    /// syncs submodules and verifies none of them is stale.
    ///
    /// # Errors
    /// Returns the first failing step; [`Error::StaleSubmodule`] if a
    /// submodule is not at its recorded commit afterwards.
    pub fn ensure(&self, repo: &str, branch: &str) -> Result<()> {
        self.ensure_cloned()?;
        self.add_remote(repo)?;
        self.git(["fetch", "--all", "--prune"])?;
        self.scrub()?;

        let remote = self.config.layout.remote_name(repo);
        let tracking = format!("{remote}/{branch}");
        self.git(["checkout", "--detach", tracking.as_str()])?;

        self.update_submodules()?;
        self.check_submodules()
    }

    /// Discard local modifications and untracked or ignored files.
    ///
    /// # Errors
    /// Returns error if reset or clean fails.
    pub fn scrub(&self) -> Result<()> {
        self.git(["reset", "--hard", "HEAD"])?;
        self.git(["clean", "-ffdx"])?;
        Ok(())
    }

    // === Lookups ===

    /// Resolve the head commit of `branch` in `repo` on the server.
    ///
    /// # Errors
    /// Returns [`Error::BranchNotFound`] if the remote has no such branch, or
    /// the `ls-remote` failure if the server cannot be queried.
    pub fn resolve_branch(&self, repo: &str, branch: &str) -> Result<String> {
        self.ensure_cloned()?;
        let url = self.config.layout.url(repo);
        let output = self.git(["ls-remote", "--heads", url.as_str(), branch])?;

        parse_ls_remote(&output.stdout, branch).ok_or_else(|| Error::BranchNotFound {
            remote: repo.to_string(),
            branch: branch.to_string(),
        })
    }

    /// Resolve a revision inside the mirror to a full commit id.
    ///
    /// # Errors
    /// Returns error if the revision is unknown.
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        let output = self.git(["rev-parse", "--verify", rev])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Whether `sha` is already contained in the main branch.
    ///
    /// An unknown commit counts as not contained.
    ///
    /// # Errors
    /// Returns error only for failures other than "not an ancestor" and
    /// "unknown commit".
    pub fn is_in_main(&self, sha: &str) -> Result<bool> {
        let main = self.main_ref();
        match self.git(["merge-base", "--is-ancestor", sha, main.as_str()]) {
            Ok(_) => Ok(true),
            Err(Error::Command { code: 1 | 128, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// What HEAD currently points at.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be resolved at all.
    pub fn head(&self) -> Result<Head> {
        match self.git(["symbolic-ref", "-q", "--short", "HEAD"]) {
            Ok(output) => Ok(Head::Branch(output.stdout.trim().to_string())),
            Err(Error::Command { code: 1, .. }) => self.rev_parse("HEAD").map(Head::Detached),
            Err(e) => Err(e),
        }
    }

    /// Check out a previously recorded HEAD.
    ///
    /// # Errors
    /// Returns error if the checkout fails.
    pub fn checkout_head(&self, head: &Head) -> Result<()> {
        match head {
            Head::Branch(name) => self.git(["checkout", "-f", name.as_str()])?,
            Head::Detached(sha) => self.git(["checkout", "-f", "--detach", sha.as_str()])?,
        };
        Ok(())
    }

    // === Restore ===

    /// Hard-reset the current branch to `rev` and bring submodules along.
    ///
    /// # Errors
    /// Returns error if the reset or the submodule refresh fails.
    pub fn reset_to(&self, rev: &str) -> Result<()> {
        self.git(["reset", "--hard", rev])?;
        self.git(["submodule", "--quiet", "sync"])?;
        self.git(["submodule", "--quiet", "update"])?;
        Ok(())
    }

    /// Sync submodule URLs and check out recorded submodule commits.
    ///
    /// # Errors
    /// Returns error if either submodule command fails.
    pub fn update_submodules(&self) -> Result<()> {
        self.git(["submodule", "--quiet", "sync", "--recursive"])?;
        self.git(["submodule", "--quiet", "update", "--init", "--recursive"])?;
        Ok(())
    }

    /// Fail if any submodule is not at its recorded commit.
    ///
    /// # Errors
    /// Returns [`Error::StaleSubmodule`] naming the first offending path.
    pub fn check_submodules(&self) -> Result<()> {
        let output = self.git(["submodule", "status", "--recursive"])?;
        submodule::check_current(&output.stdout)
    }
}

/// Find the commit for `refs/heads/<branch>` in `git ls-remote` output.
///
/// The output is one `<sha>\t<ref>` pair per line; only an exact ref match
/// counts, so `topic` does not match `refs/heads/feature/topic`.
#[must_use]
pub fn parse_ls_remote(output: &str, branch: &str) -> Option<String> {
    let wanted = format!("refs/heads/{branch}");
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let sha = fields.next()?;
        let name = fields.next()?;
        (name == wanted).then(|| sha.to_string())
    })
}
