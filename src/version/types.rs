//! Version value type

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A released engine version, `major.minor.bugfix`.
///
/// Versions are totally ordered by their components. They serialize as
/// the dotted string so persisted records stay human readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
}

/// Failure to parse a dotted version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version string {input:?}: {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Version {
    /// The version of the running engine.
    pub const LATEST: Version = Version::new(10, 0, 0);

    /// First release whose segments carry a unique segment id.
    pub const ID_INTRODUCED: Version = Version::new(8, 6, 0);

    pub const fn new(major: u32, minor: u32, bugfix: u32) -> Self {
        Self {
            major,
            minor,
            bugfix,
        }
    }

    /// Parse `"9.4.1"`. A missing bugfix component (`"9.4"`) reads as zero.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let err = |reason| VersionParseError {
            input: input.to_string(),
            reason,
        };

        let mut parts = input.trim().split('.');
        let mut next = |required: bool| -> Result<u32, VersionParseError> {
            match parts.next() {
                Some(p) if !p.is_empty() => p.parse::<u32>().map_err(|_| err("non-numeric component")),
                Some(_) => Err(err("empty component")),
                None if required => Err(err("missing component")),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(true)?;
        let bugfix = next(false)?;
        if parts.next().is_some() {
            return Err(err("too many components"));
        }
        Ok(Self::new(major, minor, bugfix))
    }

    /// True if this version is `major.minor` or later.
    pub fn on_or_after(&self, other: Version) -> bool {
        *self >= other
    }

    /// Name of the codec this engine version writes segments with.
    pub fn codec_name(&self) -> String {
        format!("Strata{}{}", self.major, self.minor)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.bugfix).cmp(&(other.major, other.minor, other.bugfix))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v = Version::parse("9.4.1").unwrap();
        assert_eq!(v, Version::new(9, 4, 1));
        assert_eq!(v.to_string(), "9.4.1");
        assert_eq!(Version::parse("8.11").unwrap(), Version::new(8, 11, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("9").is_err());
        assert!(Version::parse("9.x.1").is_err());
        assert!(Version::parse("9.1.1.1").is_err());
        assert!(Version::parse("9..1").is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(Version::new(9, 10, 0) > Version::new(9, 9, 2));
        assert!(Version::new(10, 0, 0) > Version::new(9, 12, 0));
        assert!(Version::new(8, 6, 0).on_or_after(Version::ID_INTRODUCED));
        assert!(!Version::new(8, 5, 2).on_or_after(Version::ID_INTRODUCED));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Version::new(9, 0, 0)).unwrap();
        assert_eq!(json, "\"9.0.0\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(9, 0, 0));
        assert!(serde_json::from_str::<Version>("\"nine\"").is_err());
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(Version::LATEST.codec_name(), "Strata100");
        assert_eq!(Version::new(9, 12, 0).codec_name(), "Strata912");
    }
}
