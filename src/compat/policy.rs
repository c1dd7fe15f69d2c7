//! Pure classification of a segment stamp against an engine version

use std::fmt;

use crate::error::{IndexError, Result};
use crate::segment::SegmentVersionStamp;
use crate::version::Version;

/// Oldest major the engine reads and writes without opt-in.
pub fn min_supported_major(engine: Version) -> u32 {
    engine.major.saturating_sub(1)
}

/// Why a version was refused. The two shapes never mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalDetail {
    Bounds {
        version: Version,
        min_supported: Version,
        max_supported: Version,
    },
    Reason(String),
}

impl fmt::Display for RefusalDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalDetail::Bounds {
                version,
                min_supported,
                max_supported,
            } => write!(f, "{version} (needs to be between {min_supported} and {max_supported})"),
            RefusalDetail::Reason(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TooOld,
    TooNew,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub direction: Direction,
    pub detail: RefusalDetail,
}

impl Refusal {
    pub fn too_old(detail: RefusalDetail) -> Self {
        Self {
            direction: Direction::TooOld,
            detail,
        }
    }

    pub fn too_new(detail: RefusalDetail) -> Self {
        Self {
            direction: Direction::TooNew,
            detail,
        }
    }

    /// Attach the resource being opened.
    pub fn into_error(self, resource: impl Into<String>) -> IndexError {
        let resource = resource.into();
        match self.direction {
            Direction::TooOld => IndexError::FormatTooOld {
                resource,
                detail: self.detail,
            },
            Direction::TooNew => IndexError::FormatTooNew {
                resource,
                detail: self.detail,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Refuse(Refusal),
    ReadOnly,
    ReadWrite,
}

impl Compatibility {
    pub fn is_refused(&self) -> bool {
        matches!(self, Compatibility::Refuse(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compatibility::Refuse(_) => "refuse",
            Compatibility::ReadOnly => "read-only",
            Compatibility::ReadWrite => "read-write",
        }
    }
}

/// Classify a segment stamp for the running `engine`.
pub fn classify(stamp: &SegmentVersionStamp, engine: Version) -> Compatibility {
    let created = stamp.created_by_version;
    let min_major = min_supported_major(engine);
    let bounds = |version| RefusalDetail::Bounds {
        version,
        min_supported: Version::new(min_major.saturating_sub(1), 0, 0),
        max_supported: engine,
    };

    if stamp.min_compatible_version > created {
        return Compatibility::Refuse(Refusal::too_old(RefusalDetail::Reason(format!(
            "corrupt version stamp: minimum compatible version {} is newer than created-by version {}",
            stamp.min_compatible_version, created
        ))));
    }
    if created.major > engine.major {
        return Compatibility::Refuse(Refusal::too_new(bounds(created)));
    }
    if stamp.min_compatible_version > engine {
        return Compatibility::Refuse(Refusal::too_new(bounds(stamp.min_compatible_version)));
    }
    if created.major + 1 < min_major {
        return Compatibility::Refuse(Refusal::too_old(bounds(created)));
    }
    if created.major < min_major {
        return Compatibility::ReadOnly;
    }
    Compatibility::ReadWrite
}

/// Segments may only be composed into an index created under the same
/// major.
pub fn check_same_creation_major(segment_major: u32, index_major: u32) -> Result<()> {
    if segment_major != index_major {
        return Err(IndexError::IncompatibleVersionMerge {
            segment_major,
            index_major,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentId;

    fn stamp(created: Version) -> SegmentVersionStamp {
        SegmentVersionStamp::new(created, created, Some(SegmentId::random()))
    }

    const ENGINE: Version = Version::LATEST;

    #[test]
    fn test_current_and_previous_major_read_write() {
        assert_eq!(classify(&stamp(Version::new(10, 0, 0)), ENGINE), Compatibility::ReadWrite);
        assert_eq!(classify(&stamp(Version::new(9, 0, 0)), ENGINE), Compatibility::ReadWrite);
        assert_eq!(classify(&stamp(Version::new(9, 12, 0)), ENGINE), Compatibility::ReadWrite);
    }

    #[test]
    fn test_n_minus_two_read_only() {
        assert_eq!(classify(&stamp(Version::new(8, 11, 2)), ENGINE), Compatibility::ReadOnly);
        assert_eq!(classify(&stamp(Version::new(8, 0, 0)), ENGINE), Compatibility::ReadOnly);
    }

    #[test]
    fn test_older_refused_with_bounds() {
        match classify(&stamp(Version::new(7, 7, 3)), ENGINE) {
            Compatibility::Refuse(Refusal {
                direction: Direction::TooOld,
                detail:
                    RefusalDetail::Bounds {
                        version,
                        min_supported,
                        max_supported,
                    },
            }) => {
                assert_eq!(version, Version::new(7, 7, 3));
                assert_eq!(min_supported, Version::new(8, 0, 0));
                assert_eq!(max_supported, ENGINE);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_future_major_refused_too_new() {
        match classify(&stamp(Version::new(11, 0, 0)), ENGINE) {
            Compatibility::Refuse(r) => {
                assert_eq!(r.direction, Direction::TooNew);
                assert!(matches!(r.detail, RefusalDetail::Bounds { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_min_compatible_newer_than_engine_refused() {
        let s = SegmentVersionStamp::new(Version::new(10, 2, 0), Version::new(10, 2, 0), None);
        let c = classify(&s, Version::new(10, 0, 0));
        assert!(matches!(c, Compatibility::Refuse(Refusal { direction: Direction::TooNew, .. })));
    }

    #[test]
    fn test_corrupt_stamp_refused_with_reason() {
        let s = SegmentVersionStamp::new(Version::new(9, 0, 0), Version::new(9, 5, 0), None);
        match classify(&s, ENGINE) {
            Compatibility::Refuse(r) => assert!(matches!(r.detail, RefusalDetail::Reason(_))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bands_follow_engine_version() {
        let engine = Version::new(9, 4, 0);
        assert_eq!(classify(&stamp(Version::new(8, 1, 0)), engine), Compatibility::ReadWrite);
        assert_eq!(classify(&stamp(Version::new(7, 0, 0)), engine), Compatibility::ReadOnly);
        assert!(classify(&stamp(Version::new(10, 0, 0)), engine).is_refused());
    }

    #[test]
    fn test_refusal_into_error_keeps_shape() {
        let err = Refusal::too_old(RefusalDetail::Reason("unknown".into())).into_error("/idx/_0.si");
        assert!(matches!(err, IndexError::FormatTooOld { .. }));
        assert!(err.to_string().contains("path=\"/idx/_0.si\""));
    }

    #[test]
    fn test_creation_major_check() {
        assert!(check_same_creation_major(10, 10).is_ok());
        let err = check_same_creation_major(9, 10).unwrap_err();
        assert!(matches!(
            err,
            IndexError::IncompatibleVersionMerge {
                segment_major: 9,
                index_major: 10
            }
        ));
    }
}
