//! Framed, checksummed file records
//!
//! Every index file is a single record:
//!
//! ```text
//! +------------------+
//! | Magic "STRA"     | (4 bytes)
//! +------------------+
//! | Record Kind      | (u8)
//! +------------------+
//! | Body Length      | (u32 LE)
//! +------------------+
//! | Body             | (JSON)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StorageError, StorageResult};

const MAGIC: &[u8; 4] = b"STRA";
const HEADER_LEN: usize = 4 + 1 + 4;
const CHECKSUM_LEN: usize = 4;

/// What a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Commit = 1,
    SegmentInfo = 2,
    SegmentData = 3,
    CompoundSegment = 4,
    SegmentUpdates = 5,
}

impl RecordKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(RecordKind::Commit),
            2 => Some(RecordKind::SegmentInfo),
            3 => Some(RecordKind::SegmentData),
            4 => Some(RecordKind::CompoundSegment),
            5 => Some(RecordKind::SegmentUpdates),
            _ => None,
        }
    }
}

/// Serialize `value` into a framed record.
pub fn encode_record<T: Serialize>(kind: RecordKind, value: &T, resource: &str) -> StorageResult<Vec<u8>> {
    let body = serde_json::to_vec(value)
        .map_err(|e| StorageError::corruption(resource, format!("cannot encode record: {e}")))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len() + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(kind as u8);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&body);

    let checksum = compute_checksum(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Verify framing and checksum, then deserialize the body.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8], expected: RecordKind, resource: &str) -> StorageResult<T> {
    let corrupt = |reason: String| StorageError::corruption(resource, reason);

    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(corrupt(format!("truncated record: {} bytes", bytes.len())));
    }
    if &bytes[..4] != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let (framed, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut checksum_bytes = [0u8; 4];
    checksum_bytes.copy_from_slice(trailer);
    if !verify_checksum(framed, u32::from_le_bytes(checksum_bytes)) {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let kind = RecordKind::from_u8(bytes[4]).ok_or_else(|| corrupt(format!("unknown record kind {}", bytes[4])))?;
    if kind != expected {
        return Err(corrupt(format!("expected {:?} record, found {:?}", expected, kind)));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[5..9]);
    let body_len = u32::from_le_bytes(len_bytes) as usize;
    if HEADER_LEN + body_len != framed.len() {
        return Err(corrupt(format!(
            "body length {} does not match record size {}",
            body_len,
            bytes.len()
        )));
    }

    serde_json::from_slice(&framed[HEADER_LEN..]).map_err(|e| corrupt(format!("cannot decode record body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> BTreeMap<String, u32> {
        BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)])
    }

    #[test]
    fn test_encode_decode() {
        let bytes = encode_record(RecordKind::Commit, &sample(), "commit_1").unwrap();
        let back: BTreeMap<String, u32> = decode_record(&bytes, RecordKind::Commit, "commit_1").unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_detects_flipped_byte() {
        let mut bytes = encode_record(RecordKind::Commit, &sample(), "x").unwrap();
        bytes[12] ^= 0x20;
        let err = decode_record::<BTreeMap<String, u32>>(&bytes, RecordKind::Commit, "x").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_detects_truncation_and_wrong_kind() {
        let bytes = encode_record(RecordKind::SegmentInfo, &sample(), "x").unwrap();
        assert!(decode_record::<BTreeMap<String, u32>>(&bytes[..6], RecordKind::SegmentInfo, "x").is_err());
        assert!(decode_record::<BTreeMap<String, u32>>(&bytes, RecordKind::Commit, "x").is_err());
    }
}
