//! Storage error types
//!
//! Error codes:
//! - STRATA_STORAGE_IO_ERROR (ERROR severity)
//! - STRATA_STORAGE_WRITE_FAILED (ERROR severity)
//! - STRATA_STORAGE_READ_FAILED (ERROR severity)
//! - STRATA_FILE_NOT_FOUND (ERROR severity)
//! - STRATA_LOCK_OBTAIN_FAILED (REJECT severity)
//! - STRATA_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

use crate::error::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure
    StorageIoError,
    /// File write or rename failed
    StorageWriteFailed,
    /// File read failed
    StorageReadFailed,
    /// Requested file does not exist
    FileNotFound,
    /// Another writer holds the index lock
    LockObtainFailed,
    /// Framing or checksum failure
    DataCorruption,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::StorageIoError => "STRATA_STORAGE_IO_ERROR",
            StorageErrorCode::StorageWriteFailed => "STRATA_STORAGE_WRITE_FAILED",
            StorageErrorCode::StorageReadFailed => "STRATA_STORAGE_READ_FAILED",
            StorageErrorCode::FileNotFound => "STRATA_FILE_NOT_FOUND",
            StorageErrorCode::LockObtainFailed => "STRATA_LOCK_OBTAIN_FAILED",
            StorageErrorCode::DataCorruption => "STRATA_DATA_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::StorageIoError
            | StorageErrorCode::StorageWriteFailed
            | StorageErrorCode::StorageReadFailed
            | StorageErrorCode::FileNotFound => Severity::Error,
            StorageErrorCode::LockObtainFailed => Severity::Reject,
            StorageErrorCode::DataCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with the resource it concerns.
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    resource: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>, resource: Option<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            resource,
            source,
        }
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::StorageIoError, message, None, Some(source))
    }

    pub fn write_failed(resource: impl Into<String>, source: io::Error) -> Self {
        Self::new(
            StorageErrorCode::StorageWriteFailed,
            "write failed",
            Some(resource.into()),
            Some(source),
        )
    }

    pub fn read_failed(resource: impl Into<String>, source: io::Error) -> Self {
        Self::new(
            StorageErrorCode::StorageReadFailed,
            "read failed",
            Some(resource.into()),
            Some(source),
        )
    }

    pub fn file_not_found(resource: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::FileNotFound, "file not found", Some(resource.into()), None)
    }

    pub fn lock_obtain_failed(resource: impl Into<String>) -> Self {
        Self::new(
            StorageErrorCode::LockObtainFailed,
            "lock held by another writer",
            Some(resource.into()),
            None,
        )
    }

    /// Framing or checksum failure in `resource`.
    pub fn corruption(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::DataCorruption, reason, Some(resource.into()), None)
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StorageErrorCode::FileNotFound
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref resource) = self.resource {
            write!(f, " (resource path=\"{}\")", resource)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
