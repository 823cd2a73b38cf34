//! Source-control revision identifiers and resolved source versions.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Length of an abbreviated revision id.
pub const SHORT_REVISION_LEN: usize = 7;

/// Length of a full revision id.
pub const FULL_REVISION_LEN: usize = 40;

static FULL_REVISION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("revision regex is valid"));

static BUILD_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,19}$").expect("build id regex is valid"));

/// A single point in source history, as reported by an external system.
///
/// External systems sometimes hand back abbreviated ids, so comparisons go
/// through [`RevisionId::matches`] rather than `==`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when this is a full-length hexadecimal revision id.
    pub fn is_full(&self) -> bool {
        FULL_REVISION_REGEX.is_match(&self.0)
    }

    /// Abbreviated form (first 7 characters, or the whole id if shorter).
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(SHORT_REVISION_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// Compare two revision ids, tolerating abbreviation.
    ///
    /// Full ids compare in full. When either side is abbreviated, both must
    /// carry at least [`SHORT_REVISION_LEN`] characters and are compared over
    /// the length of the shorter one, so every character either side reports
    /// is checked. Shorter ids only match exactly. A 7-character prefix can
    /// still collide; callers wanting certainty should use [`Self::same_full`].
    pub fn matches(&self, other: &RevisionId) -> bool {
        if self.is_full() && other.is_full() {
            return self.0.eq_ignore_ascii_case(&other.0);
        }
        let (len, other_len) = (self.0.chars().count(), other.0.chars().count());
        if len >= SHORT_REVISION_LEN && other_len >= SHORT_REVISION_LEN {
            return self
                .0
                .chars()
                .zip(other.0.chars())
                .all(|(a, b)| a.eq_ignore_ascii_case(&b));
        }
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// `true` only when both ids are full-length and identical.
    pub fn same_full(&self, other: &RevisionId) -> bool {
        self.is_full() && other.is_full() && self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What a release artifact's version reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionReference {
    /// A full revision id, usable as-is.
    Revision(RevisionId),
    /// A numeric build id that must itself be resolved.
    Build(u64),
    Unrecognized(String),
}

impl VersionReference {
    /// Classify a release artifact's version string.
    ///
    /// Only full 40-character ids count as revisions. An all-digit string is
    /// taken as a build id, so an abbreviated hash made only of digits
    /// (e.g. `1234567`) is ambiguous and is looked up as a build.
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if FULL_REVISION_REGEX.is_match(raw) {
            return VersionReference::Revision(RevisionId::new(raw));
        }
        if BUILD_ID_REGEX.is_match(raw) {
            if let Ok(id) = raw.parse::<u64>() {
                return VersionReference::Build(id);
            }
        }
        VersionReference::Unrecognized(raw.to_string())
    }
}

/// A deployment owner mapped onto concrete source history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSourceVersion {
    pub revision: RevisionId,
    pub observed_at: DateTime<Utc>,
    pub web_link: Option<String>,
    /// Repository the revision was built from, when the source reports it.
    pub origin_repository: Option<String>,
}

impl ResolvedSourceVersion {
    /// Whether this version was built from `repository`.
    ///
    /// Case-insensitive substring match in either direction, so that
    /// `"Org/Widgets"` and `"widgets"` are treated as the same repository.
    /// Unknown origins are never the same repository.
    pub fn is_same_repository(&self, repository: &str) -> bool {
        let Some(origin) = self.origin_repository.as_deref() else {
            return false;
        };
        let origin = origin.trim().to_lowercase();
        let tracked = repository.trim().to_lowercase();
        if origin.is_empty() || tracked.is_empty() {
            return false;
        }
        origin.contains(&tracked) || tracked.contains(&origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_A: &str = "3f2a9c1d4b5e6f708192a3b4c5d6e7f801234567";
    const FULL_A_UPPER: &str = "3F2A9C1D4B5E6F708192A3B4C5D6E7F801234567";
    const FULL_A_SIBLING: &str = "3f2a9c1ffffffffffffffffffffffffffffffff0";

    fn version(origin: Option<&str>) -> ResolvedSourceVersion {
        ResolvedSourceVersion {
            revision: RevisionId::new(FULL_A),
            observed_at: Utc::now(),
            web_link: None,
            origin_repository: origin.map(str::to_string),
        }
    }

    #[test]
    fn test_full_ids_compare_in_full() {
        let a = RevisionId::new(FULL_A);
        assert!(a.is_full());
        assert!(a.matches(&RevisionId::new(FULL_A_UPPER)));
        // Same 7-char prefix, different full id: full comparison wins.
        assert!(!a.matches(&RevisionId::new(FULL_A_SIBLING)));
    }

    #[test]
    fn test_abbreviated_ids_compare_by_prefix() {
        let full = RevisionId::new(FULL_A);
        let short = RevisionId::new("3f2a9c1");
        assert!(!short.is_full());
        assert!(full.matches(&short));
        assert!(short.matches(&full));
        assert!(!RevisionId::new("3f2a9c2").matches(&full));
    }

    #[test]
    fn test_longer_abbreviations_compare_every_character() {
        let full = RevisionId::new(FULL_A_SIBLING);
        // Shares the first 7 characters, differs at the 8th.
        let change = RevisionId::new("3f2a9c1d8e");
        assert!(!change.matches(&full));
        assert!(!full.matches(&change));
        assert!(RevisionId::new("3f2a9c1fff").matches(&full));
        assert!(RevisionId::new("3f2a9c1d8e").matches(&RevisionId::new("3F2A9C1D")));
        assert!(!RevisionId::new("3f2a9c1d8e").matches(&RevisionId::new("3f2a9c1d9")));
    }

    #[test]
    fn test_same_full_requires_both_full() {
        let full = RevisionId::new(FULL_A);
        assert!(full.same_full(&RevisionId::new(FULL_A_UPPER)));
        assert!(!full.same_full(&RevisionId::new("3f2a9c1")));
        assert!(!RevisionId::new("3f2a9c1").same_full(&RevisionId::new("3f2a9c1")));
    }

    #[test]
    fn test_all_digit_abbreviation_classifies_as_build() {
        assert_eq!(
            VersionReference::classify("1234567"),
            VersionReference::Build(1234567)
        );
    }

    #[test]
    fn test_tiny_ids_require_exact_match() {
        let a = RevisionId::new("abc");
        assert!(a.matches(&RevisionId::new("ABC")));
        assert!(!a.matches(&RevisionId::new(FULL_A)));
    }

    #[test]
    fn test_short_form() {
        assert_eq!(RevisionId::new(FULL_A).short(), "3f2a9c1");
        assert_eq!(RevisionId::new("abc").short(), "abc");
    }

    #[test]
    fn test_classify_version_reference() {
        assert_eq!(
            VersionReference::classify(FULL_A),
            VersionReference::Revision(RevisionId::new(FULL_A))
        );
        assert_eq!(
            VersionReference::classify(" 20240117 "),
            VersionReference::Build(20240117)
        );
        assert_eq!(
            VersionReference::classify("1.2.3"),
            VersionReference::Unrecognized("1.2.3".to_string())
        );
        // Abbreviated hashes are not trusted as release revisions.
        assert!(matches!(
            VersionReference::classify("3f2a9c1"),
            VersionReference::Unrecognized(_)
        ));
    }

    #[test]
    fn test_same_repository_substring_either_direction() {
        assert!(version(Some("Org/Widgets")).is_same_repository("widgets"));
        assert!(version(Some("widgets")).is_same_repository("org/WIDGETS"));
        assert!(!version(Some("gadgets")).is_same_repository("widgets"));
    }

    #[test]
    fn test_unknown_origin_is_not_same_repository() {
        assert!(!version(None).is_same_repository("widgets"));
        assert!(!version(Some("  ")).is_same_repository("widgets"));
    }
}
