//! CRC32 checksums for index files
//!
//! Every file the index writes ends with a CRC32 (IEEE polynomial) over
//! all preceding bytes. A mismatch on read is corruption.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}
