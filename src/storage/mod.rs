//! Storage subsystem
//!
//! Index files live in a [`Store`]: a flat namespace of named byte files
//! with atomic replace and a single write lock. Every file is one framed
//! record whose checksum is verified on every read.
//!
//! # Design Principles
//!
//! - Files are written once under a fresh name, or atomically replaced
//! - Checksum-verified on every read
//! - Corruption is fatal for the operation, never silently skipped

mod checksum;
mod errors;
mod record;
mod store;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use record::{decode_record, encode_record, RecordKind};
pub use store::{FsStore, MemoryStore, Store, StoreImpl, WriteLock, WRITE_LOCK_NAME};
