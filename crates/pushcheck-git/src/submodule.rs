//! Stale submodule detection.
//!
//! After a checkout or merge the mirror runs `submodule sync` and
//! `submodule update`; if any submodule still does not sit at the commit
//! recorded in the superproject, the tree is not what the branch describes
//! and the operation must fail instead of reporting success.

use crate::error::{Error, Result};

/// One line of `git submodule status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleStatus {
    /// Path relative to the superproject root.
    pub path: String,
    /// Commit currently checked out (or recorded, when not initialised).
    pub commit: String,
    /// The status marker git prints in the first column.
    pub marker: SubmoduleMarker,
}

/// First-column marker of `git submodule status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleMarker {
    /// Checked out at the recorded commit.
    Current,
    /// `-`: not initialised.
    Uninitialized,
    /// `+`: checked-out commit differs from the recorded one.
    Mismatch,
    /// `U`: merge conflicts in the submodule.
    Conflict,
}

impl SubmoduleStatus {
    /// Whether this submodule is in a usable state.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        matches!(self.marker, SubmoduleMarker::Current)
    }
}

/// Parse the output of `git submodule status`.
///
/// Lines that do not have at least a commit and a path are ignored.
#[must_use]
pub fn parse_status(output: &str) -> Vec<SubmoduleStatus> {
    output
        .lines()
        .filter_map(|line| {
            let mut chars = line.chars();
            let marker = match chars.next()? {
                ' ' => SubmoduleMarker::Current,
                '-' => SubmoduleMarker::Uninitialized,
                '+' => SubmoduleMarker::Mismatch,
                'U' => SubmoduleMarker::Conflict,
                _ => return None,
            };
            let mut fields = chars.as_str().split_whitespace();
            let commit = fields.next()?.to_string();
            let path = fields.next()?.to_string();
            Some(SubmoduleStatus {
                path,
                commit,
                marker,
            })
        })
        .collect()
}

/// Fail with [`Error::StaleSubmodule`] for the first submodule in
/// `status_output` (from `git submodule status`) that is not at its
/// recorded commit.
///
/// # Errors
/// Returns [`Error::StaleSubmodule`] naming the offending path.
pub fn check_current(status_output: &str) -> Result<()> {
    match parse_status(status_output)
        .into_iter()
        .find(|s| !s.is_current())
    {
        Some(stale) => Err(Error::StaleSubmodule { path: stale.path }),
        None => Ok(()),
    }
}
