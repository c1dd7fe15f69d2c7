//! Read windows: which versions an open call admits

use tracing::debug;

use super::policy::{classify, min_supported_major, Compatibility, Refusal, RefusalDetail};
use crate::error::{IndexError, Result};
use crate::segment::SegmentVersionStamp;
use crate::version::Version;

/// Versions a particular open call is willing to accept.
///
/// The default window admits only read-write segments. A window built
/// with [`ReadWindow::with_min_major`] one major lower also admits the
/// read-only band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWindow {
    engine: Version,
    min_major: u32,
}

impl ReadWindow {
    pub fn default_for(engine: Version) -> Self {
        Self {
            engine,
            min_major: min_supported_major(engine),
        }
    }

    /// Explicit opt-in to read indexes as old as `min_major`.
    pub fn with_min_major(engine: Version, min_major: u32) -> Result<Self> {
        let floor = min_supported_major(engine).saturating_sub(1);
        if min_major < floor || min_major > engine.major {
            return Err(IndexError::invalid_argument(format!(
                "minimum supported major must be between {} and {}, got {}",
                floor, engine.major, min_major
            )));
        }
        Ok(Self { engine, min_major })
    }

    pub fn engine(&self) -> Version {
        self.engine
    }

    pub fn min_major(&self) -> u32 {
        self.min_major
    }

    pub fn allows_read_only(&self) -> bool {
        self.min_major < min_supported_major(self.engine)
    }

    /// Admit one segment or refuse it naming `resource`.
    pub fn admit_segment(&self, stamp: &SegmentVersionStamp, resource: &str) -> Result<Compatibility> {
        let verdict = classify(stamp, self.engine);
        match verdict {
            Compatibility::Refuse(refusal) => Err(refusal.into_error(resource)),
            Compatibility::ReadOnly if !self.allows_read_only() => Err(Refusal::too_old(RefusalDetail::Bounds {
                version: stamp.created_by_version,
                min_supported: Version::new(self.min_major, 0, 0),
                max_supported: self.engine,
            })
            .into_error(resource)),
            admitted => {
                debug!(resource, verdict = admitted.as_str(), "segment admitted");
                Ok(admitted)
            }
        }
    }

    /// Admit an index by the major it was created under.
    pub fn admit_index(&self, created_major: u32, resource: &str) -> Result<()> {
        if created_major > self.engine.major {
            return Err(Refusal::too_new(RefusalDetail::Bounds {
                version: Version::new(created_major, 0, 0),
                min_supported: Version::new(self.min_major, 0, 0),
                max_supported: self.engine,
            })
            .into_error(resource));
        }
        if created_major < self.min_major {
            return Err(Refusal::too_old(RefusalDetail::Reason(format!(
                "This index was initially created with major version {} while the current version is {} \
                 and strata only supports reading from version {} upwards",
                created_major, self.engine, self.min_major
            )))
            .into_error(resource));
        }
        Ok(())
    }
}
