//! Fingerprint: the deduplication key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};

/// Stable identity of a discovered item, derived from its canonical
/// source URL or identifier. Unique key across the whole system.
///
/// Validated at construction: a fingerprint the upstream feed could not
/// form properly (empty, control characters) is a permanent per-item
/// condition, not something to retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return Err(HeraldError::InvalidFingerprint(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn accepts_canonical_urls() {
        let fp = Fingerprint::new("https://doi.org/10.1038/s41586-example").unwrap();
        assert_eq!(fp.as_str(), "https://doi.org/10.1038/s41586-example");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let fp = Fingerprint::new("  doi:10.1126/science.abc1234  ").unwrap();
        assert_eq!(fp.as_str(), "doi:10.1126/science.abc1234");
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::newline("doi:10.1/abc\ndef")]
    fn rejects_unusable_input(#[case] raw: &str) {
        assert!(matches!(
            Fingerprint::new(raw),
            Err(HeraldError::InvalidFingerprint(_))
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let fp = Fingerprint::new("doi:10.1/abc").unwrap();
        assert_eq!(serde_json::to_string(&fp).unwrap(), "\"doi:10.1/abc\"");
    }
}
