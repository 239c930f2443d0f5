//! Push request and push records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::tags::TagSet;

/// Identifier of a push request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a push (a deployment batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushId(pub u64);

impl fmt::Display for PushId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A 40-character commit id recorded against a request.
///
/// New requests carry [`Revision::unresolved`] (forty zeros) until their
/// branch has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    const LEN: usize = 40;

    /// The "not yet resolved" sentinel.
    #[must_use]
    pub fn unresolved() -> Self {
        Self("0".repeat(Self::LEN))
    }

    /// Validate and normalize (lowercase) a commit id.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRevision`] unless `sha` is 40 hex digits.
    pub fn parse(sha: &str) -> Result<Self> {
        let sha = sha.trim();
        if sha.len() == Self::LEN && sha.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(sha.to_ascii_lowercase()))
        } else {
            Err(Error::InvalidRevision(sha.to_string()))
        }
    }

    /// Whether this is a real commit id rather than the sentinel.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.bytes().any(|b| b != b'0')
    }

    /// The commit id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a request. The queue reads but never changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    #[default]
    Requested,
    Pickme,
    Added,
    Staged,
    Verified,
    Blessed,
    Live,
    Delayed,
    Discarded,
}

impl RequestState {
    /// Lowercase name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Pickme => "pickme",
            Self::Added => "added",
            Self::Staged => "staged",
            Self::Verified => "verified",
            Self::Blessed => "blessed",
            Self::Live => "live",
            Self::Delayed => "delayed",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "requested" => Self::Requested,
            "pickme" => Self::Pickme,
            "added" => Self::Added,
            "staged" => Self::Staged,
            "verified" => Self::Verified,
            "blessed" => Self::Blessed,
            "live" => Self::Live,
            "delayed" => Self::Delayed,
            "discarded" => Self::Discarded,
            other => return Err(Error::InvalidState(other.to_string())),
        })
    }
}

/// A developer's request to include a branch in a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub id: RequestId,
    /// Requesting user.
    pub user: String,
    /// Users copied on notifications.
    #[serde(default)]
    pub watchers: Vec<String>,
    pub title: String,
    /// Repository name: the main repository or a developer repository.
    pub repo: String,
    /// Branch name; may be empty.
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub revision: Revision,
    /// Code review id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewid: Option<String>,
    #[serde(default)]
    pub tags: TagSet,
    /// Human-readable (HTML) conflict description.
    #[serde(default)]
    pub conflicts: String,
    #[serde(default)]
    pub state: RequestState,
}

impl PushRequest {
    /// A fresh request with no revision, tags or conflicts.
    #[must_use]
    pub fn new(
        id: RequestId,
        user: impl Into<String>,
        title: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user: user.into(),
            watchers: Vec::new(),
            title: title.into(),
            repo: repo.into(),
            branch: branch.into(),
            revision: Revision::unresolved(),
            reviewid: None,
            tags: TagSet::new(),
            conflicts: String::new(),
            state: RequestState::Requested,
        }
    }

    /// Requesting user followed by any watchers, without duplicates.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        let mut out = vec![self.user.clone()];
        for w in &self.watchers {
            if !w.is_empty() && !out.contains(w) {
                out.push(w.clone());
            }
        }
        out
    }

    /// Apply an update, returning the new record.
    #[must_use]
    pub fn updated(mut self, update: &RequestUpdate) -> Self {
        if let Some(revision) = &update.revision {
            self.revision = revision.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(conflicts) = &update.conflicts {
            self.conflicts = conflicts.clone();
        }
        if let Some(state) = update.state {
            self.state = state;
        }
        self
    }
}

/// A deployment batch grouping several requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Push {
    pub id: PushId,
    #[serde(default)]
    pub title: String,
    /// Requests belonging to this push.
    #[serde(default)]
    pub requests: Vec<RequestId>,
}

/// Column updates for a request. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestUpdate {
    pub revision: Option<Revision>,
    pub tags: Option<TagSet>,
    pub conflicts: Option<String>,
    pub state: Option<RequestState>,
}

impl RequestUpdate {
    #[must_use]
    pub fn revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: TagSet) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn conflicts(mut self, conflicts: impl Into<String>) -> Self {
        self.conflicts = Some(conflicts.into());
        self
    }

    #[must_use]
    pub const fn state(mut self, state: RequestState) -> Self {
        self.state = Some(state);
        self
    }
}
