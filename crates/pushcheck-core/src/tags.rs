//! Request tag sets.
//!
//! Tags are stored as a single comma-joined string, but inside pushcheck
//! they are always a [`TagSet`]: union and difference are set operations,
//! duplicates cannot accumulate, and the serialized form is always sorted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Branch resolved to a unique revision.
pub const GIT_OK: &str = "git-ok";
/// Branch could not be verified.
pub const GIT_ERROR: &str = "git-error";
/// Pickme does not merge onto the main branch.
pub const CONFLICT_MASTER: &str = "conflict-master";
/// Pickme merges onto the main branch but not alongside another pickme.
pub const CONFLICT_PICKME: &str = "conflict-pickme";

/// A set of request tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// An empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a comma-separated tag string. Whitespace around tags and empty
    /// entries are ignored.
    #[must_use]
    pub fn parse(tags: &str) -> Self {
        Self(
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Whether `tag` is in the set.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Whether the two sets share at least one tag.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a tag in place.
    pub fn insert(&mut self, tag: impl Into<String>) {
        self.0.insert(tag.into());
    }

    /// Remove a tag in place.
    pub fn remove(&mut self, tag: &str) {
        self.0.remove(tag);
    }

    /// This set with `tag` added.
    #[must_use]
    pub fn with(mut self, tag: &str) -> Self {
        self.insert(tag);
        self
    }

    /// This set with `tag` removed.
    #[must_use]
    pub fn without(mut self, tag: &str) -> Self {
        self.remove(tag);
        self
    }

    /// Union of two sets.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Tags of this set not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Iterate over tags in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(tag)?;
        }
        Ok(())
    }
}

impl FromStr for TagSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Serialize for TagSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Add the tags in `tags` to the stored tag string `current`.
#[must_use]
pub fn add_to_tags_str(current: &str, tags: &str) -> String {
    TagSet::parse(current).union(&TagSet::parse(tags)).to_string()
}

/// Remove the tags in `tags` from the stored tag string `current`.
#[must_use]
pub fn del_from_tags_str(current: &str, tags: &str) -> String {
    TagSet::parse(current)
        .difference(&TagSet::parse(tags))
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sorts_and_dedups() {
        assert_eq!(add_to_tags_str("b,a", "c"), "a,b,c");
        assert_eq!(add_to_tags_str("a,b", "b,a"), "a,b");
        assert_eq!(add_to_tags_str("", "git-ok"), "git-ok");
    }

    #[test]
    fn test_del() {
        assert_eq!(del_from_tags_str("a,c,b", "c,a"), "b");
        assert_eq!(del_from_tags_str("a", "a"), "");
        assert_eq!(del_from_tags_str("a,b", "zzz"), "a,b");
    }

    #[test]
    fn test_add_and_del_are_idempotent() {
        let once = add_to_tags_str("buildbot,seagull", "git-ok");
        assert_eq!(add_to_tags_str(&once, "git-ok"), once);

        let removed = del_from_tags_str(&once, "git-ok");
        assert_eq!(del_from_tags_str(&removed, "git-ok"), removed);
        assert_eq!(removed, "buildbot,seagull");
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_empties() {
        let tags = TagSet::parse(" git-ok , ,conflict-pickme,,");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(GIT_OK));
        assert!(tags.contains(CONFLICT_PICKME));
        assert_eq!(tags.to_string(), "conflict-pickme,git-ok");
    }

    #[test]
    fn test_no_substring_matching() {
        let tags = TagSet::parse("conflict-pickme");
        assert!(!tags.contains("conflict"));
        assert!(!tags.contains(CONFLICT_MASTER));
    }

    #[test]
    fn test_with_without() {
        let tags = TagSet::parse("git-error,urgent")
            .with(GIT_OK)
            .without(GIT_ERROR);
        assert_eq!(tags.to_string(), "git-ok,urgent");
    }

    #[test]
    fn test_intersects() {
        let excluded: TagSet = ["no-verify", "buildbot"].into_iter().collect();
        assert!(TagSet::parse("urgent,buildbot").intersects(&excluded));
        assert!(!TagSet::parse("urgent").intersects(&excluded));
        assert!(!TagSet::new().intersects(&excluded));
    }

    #[test]
    fn test_serde_as_sorted_string() {
        let tags = TagSet::parse("b,a");
        assert_eq!(serde_json::to_string(&tags).unwrap(), "\"a,b\"");
        let back: TagSet = serde_json::from_str("\"c,a,c\"").unwrap();
        assert_eq!(back.to_string(), "a,c");
    }
}
