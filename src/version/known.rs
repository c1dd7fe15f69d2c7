//! Static table of released versions

use super::Version;

/// Every released version, oldest first. The last entry is
/// [`Version::LATEST`].
pub const KNOWN_VERSIONS: &[Version] = &[
    Version::new(7, 0, 0),
    Version::new(7, 7, 3),
    Version::new(8, 0, 0),
    Version::new(8, 1, 0),
    Version::new(8, 1, 1),
    Version::new(8, 2, 0),
    Version::new(8, 3, 0),
    Version::new(8, 3, 1),
    Version::new(8, 4, 0),
    Version::new(8, 4, 1),
    Version::new(8, 5, 0),
    Version::new(8, 5, 1),
    Version::new(8, 5, 2),
    Version::new(8, 6, 0),
    Version::new(8, 6, 1),
    Version::new(8, 6, 2),
    Version::new(8, 6, 3),
    Version::new(8, 7, 0),
    Version::new(8, 8, 0),
    Version::new(8, 8, 1),
    Version::new(8, 8, 2),
    Version::new(8, 9, 0),
    Version::new(8, 10, 0),
    Version::new(8, 10, 1),
    Version::new(8, 11, 0),
    Version::new(8, 11, 1),
    Version::new(8, 11, 2),
    Version::new(9, 0, 0),
    Version::new(9, 1, 0),
    Version::new(9, 2, 0),
    Version::new(9, 3, 0),
    Version::new(9, 4, 0),
    Version::new(9, 4, 1),
    Version::new(9, 4, 2),
    Version::new(9, 5, 0),
    Version::new(9, 6, 0),
    Version::new(9, 7, 0),
    Version::new(9, 8, 0),
    Version::new(9, 9, 0),
    Version::new(9, 9, 1),
    Version::new(9, 9, 2),
    Version::new(9, 10, 0),
    Version::new(9, 11, 0),
    Version::new(9, 11, 1),
    Version::new(9, 12, 0),
    Version::new(10, 0, 0),
];

/// Whether `v` is a released version.
pub fn is_known(v: Version) -> bool {
    KNOWN_VERSIONS.binary_search(&v).is_ok()
}

/// Released versions with the given major, oldest first.
pub fn known_in_major(major: u32) -> impl Iterator<Item = Version> {
    KNOWN_VERSIONS.iter().copied().filter(move |v| v.major == major)
}
