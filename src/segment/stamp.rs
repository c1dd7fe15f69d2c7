//! Segment version stamps

use serde::{Deserialize, Serialize};

use super::id::SegmentId;
use crate::compat::{Refusal, RefusalDetail};
use crate::error::{IndexError, Result};
use crate::version::Version;

/// Which engine wrote a segment and which engines can still read it.
///
/// A stamp is written once with its segment and never changed. Segments
/// written before ids existed have `segment_id == None`; an id is never
/// invented for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentVersionStamp {
    pub created_by_version: Version,
    pub min_compatible_version: Version,
    pub segment_id: Option<SegmentId>,
}

impl SegmentVersionStamp {
    pub fn new(created_by_version: Version, min_compatible_version: Version, segment_id: Option<SegmentId>) -> Self {
        Self {
            created_by_version,
            min_compatible_version,
            segment_id,
        }
    }

    /// Stamp for a segment `engine` is writing now.
    pub fn fresh(engine: Version, min_compatible_version: Version) -> Self {
        let segment_id = engine.on_or_after(Version::ID_INTRODUCED).then(SegmentId::random);
        Self::new(engine, min_compatible_version, segment_id)
    }

    pub fn has_id(&self) -> bool {
        self.segment_id.is_some()
    }

    /// Written by `engine` and carrying an id.
    pub fn is_current(&self, engine: Version) -> bool {
        self.created_by_version == engine && self.has_id()
    }

    pub fn to_record(&self) -> StampRecord {
        StampRecord {
            created_by_version: self.created_by_version.to_string(),
            min_compatible_version: self.min_compatible_version.to_string(),
            segment_id: self.segment_id.map(|id| id.to_string()),
        }
    }

    /// Decode a persisted stamp. An unreadable version is refused with a
    /// free-text reason rather than bounds.
    pub fn from_record(record: &StampRecord, resource: &str) -> Result<Self> {
        let parse = |label: &str, raw: &str| {
            Version::parse(raw).map_err(|e| {
                Refusal::too_old(RefusalDetail::Reason(format!("unreadable {label} version in segment stamp: {e}")))
                    .into_error(resource)
            })
        };

        let created_by_version = parse("created-by", &record.created_by_version)?;
        let min_compatible_version = parse("minimum compatible", &record.min_compatible_version)?;
        let segment_id = record
            .segment_id
            .as_deref()
            .map(str::parse::<SegmentId>)
            .transpose()
            .map_err(|e| IndexError::corrupt(resource, e))?;

        Ok(Self::new(created_by_version, min_compatible_version, segment_id))
    }
}

/// On-disk form of a stamp. Versions stay strings so a damaged or unknown
/// version can be refused with context instead of failing the whole
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampRecord {
    pub created_by_version: String,
    pub min_compatible_version: String,
    pub segment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_stamp_ids_follow_introduction() {
        assert!(SegmentVersionStamp::fresh(Version::LATEST, Version::LATEST).has_id());
        assert!(SegmentVersionStamp::fresh(Version::new(8, 6, 0), Version::new(8, 6, 0)).has_id());
        assert!(!SegmentVersionStamp::fresh(Version::new(8, 5, 2), Version::new(8, 5, 2)).has_id());
    }

    #[test]
    fn test_is_current() {
        let v = Version::new(9, 0, 0);
        assert!(!SegmentVersionStamp::fresh(v, v).is_current(Version::LATEST));
        assert!(SegmentVersionStamp::fresh(Version::LATEST, v).is_current(Version::LATEST));
        let legacy = SegmentVersionStamp::new(Version::LATEST, Version::LATEST, None);
        assert!(!legacy.is_current(Version::LATEST));
    }

    #[test]
    fn test_record_roundtrip_keeps_missing_id() {
        let v = Version::new(8, 2, 0);
        let stamp = SegmentVersionStamp::new(v, v, None);
        let back = SegmentVersionStamp::from_record(&stamp.to_record(), "x").unwrap();
        assert_eq!(back, stamp);
        assert_eq!(back.segment_id, None);
    }

    #[test]
    fn test_unreadable_version_refused_with_reason() {
        let record = StampRecord {
            created_by_version: "9.garbage".to_string(),
            min_compatible_version: "9.0.0".to_string(),
            segment_id: None,
        };
        let err = SegmentVersionStamp::from_record(&record, "idx/_2.si").unwrap_err();
        assert!(matches!(
            err,
            IndexError::FormatTooOld {
                detail: RefusalDetail::Reason(_),
                ..
            }
        ));
        assert!(err.to_string().contains("path=\"idx/_2.si\""));
    }

    #[test]
    fn test_bad_id_is_corruption() {
        let record = StampRecord {
            created_by_version: "9.0.0".to_string(),
            min_compatible_version: "9.0.0".to_string(),
            segment_id: Some("nothex".to_string()),
        };
        let err = SegmentVersionStamp::from_record(&record, "x").unwrap_err();
        assert!(matches!(err, IndexError::CorruptIndex { .. }));
    }
}
