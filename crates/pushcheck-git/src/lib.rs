//! # pushcheck-git
//!
//! Git plumbing for pushcheck, built on the git binary. Provides the
//! command runner, the shared mirror of the main repository, and scoped
//! test branches and merges that always roll the mirror back.

mod command;
mod error;
mod mirror;
mod remote;
mod scope;
pub mod submodule;
mod traits;

pub use command::{CommandOutput, GitCommand};
pub use error::{Error, Result};
pub use mirror::{Head, Mirror, MirrorConfig, parse_ls_remote};
pub use remote::{ORIGIN, RemoteLayout};
pub use scope::{BranchScope, MergeScope, MergeSource};
pub use traits::MirrorOps;
