//! Typed errors for the filesystem engine.
//!
//! Every fallible engine operation returns [`StorageError`]: a typed
//! [`StorageErrorKind`] plus a list of [`TraceFrame`] annotations collected
//! at propagation sites. Callers branch on [`StorageError::kind`] to map
//! errors onto their own surface (HTTP status codes, exit codes); the
//! frames preserve where the error travelled through the engine without
//! any exception-style unwinding.
//!
//! Errors are returned, never logged, inside the engine. The collaborator
//! that receives them decides on logging and client-visible mapping.
//!
//! # Usage
//!
//! ```
//! use rustio_fs::error::{StorageError, StorageErrorKind};
//!
//! fn locate() -> Result<(), StorageError> {
//!     Err(StorageError::from(StorageErrorKind::BucketNotFound {
//!         bucket: "photos".to_owned(),
//!     })
//!     .trace("resolving bucket"))
//! }
//!
//! let err = locate().unwrap_err();
//! assert!(matches!(err.kind(), StorageErrorKind::BucketNotFound { .. }));
//! assert_eq!(err.frames().len(), 1);
//! ```

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

/// The taxonomy of engine failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageErrorKind {
    /// The bucket name violates the naming rules.
    #[error("invalid bucket name: {bucket}")]
    BucketNameInvalid {
        /// The offending name.
        bucket: String,
    },

    /// The bucket directory does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// The bucket that was looked up.
        bucket: String,
    },

    /// A bucket with this name already exists.
    #[error("bucket already exists: {bucket}")]
    BucketExists {
        /// The conflicting name.
        bucket: String,
    },

    /// The bucket still contains objects and cannot be deleted.
    #[error("bucket not empty: {bucket}")]
    BucketNotEmpty {
        /// The non-empty bucket.
        bucket: String,
    },

    /// The object name violates the naming rules.
    #[error("invalid object name: {object}")]
    ObjectNameInvalid {
        /// The offending name.
        object: String,
    },

    /// The target object does not exist.
    #[error("object not found: {bucket}/{object}")]
    ObjectNotFound {
        /// The bucket that was searched.
        bucket: String,
        /// The object that was looked up.
        object: String,
    },

    /// No reservation exists for this upload ID.
    #[error("invalid upload id: {upload_id}")]
    InvalidUploadId {
        /// The unknown upload ID.
        upload_id: String,
    },

    /// A part referenced at completion time was never uploaded.
    #[error("one or more of the specified parts could not be found")]
    InvalidPart,

    /// The computed MD5 did not match the expected digest.
    #[error("md5 mismatch: expected {expected}, computed {computed}")]
    BadDigest {
        /// The digest the caller declared.
        expected: String,
        /// The digest computed over the received bytes.
        computed: String,
    },

    /// The storage root has crossed the free-disk threshold.
    #[error("root path is running out of disk space: {path}")]
    RootPathFull {
        /// The storage root.
        path: PathBuf,
    },

    /// No access policy is stored for this bucket.
    #[error("no bucket policy found for bucket: {bucket}")]
    BucketPolicyNotFound {
        /// The bucket without a policy.
        bucket: String,
    },

    /// The policy document failed to parse or validate.
    #[error("invalid policy document: {reason}")]
    InvalidPolicyDocument {
        /// Why the document was rejected.
        reason: String,
    },

    /// A document exceeded its size cap.
    #[error("entity too large: {size} bytes exceeds the limit of {max}")]
    EntityTooLarge {
        /// The received size in bytes.
        size: u64,
        /// The maximum allowed size in bytes.
        max: u64,
    },

    /// Only the empty delimiter and `/` are supported.
    #[error("unsupported delimiter: {delimiter:?}")]
    UnsupportedDelimiter {
        /// The rejected delimiter.
        delimiter: String,
    },

    /// A pagination marker does not extend the requested prefix.
    #[error("invalid combination of marker {marker:?} and prefix {prefix:?}")]
    InvalidMarkerPrefix {
        /// The rejected marker.
        marker: String,
        /// The prefix it should extend.
        prefix: String,
    },

    /// An argument failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument.
        message: String,
    },

    /// Unclassified I/O failure.
    #[error("internal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unclassified internal failure carrying its own context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// One annotation appended while an error propagated through the engine.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    /// Source file of the propagation site.
    pub file: &'static str,
    /// Line of the propagation site.
    pub line: u32,
    /// Free-form note describing what the site was doing.
    pub note: String,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.note)
    }
}

/// An engine error: a typed kind plus its propagation trace.
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    trace: Vec<TraceFrame>,
}

impl StorageError {
    /// The typed kind of this error.
    #[must_use]
    pub fn kind(&self) -> &StorageErrorKind {
        &self.kind
    }

    /// Consume the error and return its kind, dropping the trace.
    #[must_use]
    pub fn into_kind(self) -> StorageErrorKind {
        self.kind
    }

    /// The propagation trace, oldest frame first.
    #[must_use]
    pub fn frames(&self) -> &[TraceFrame] {
        &self.trace
    }

    /// Append a trace frame at the caller's location.
    #[must_use]
    #[track_caller]
    pub fn trace(mut self, note: impl Into<String>) -> Self {
        let site = Location::caller();
        self.trace.push(TraceFrame {
            file: site.file(),
            line: site.line(),
            note: note.into(),
        });
        self
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if f.alternate() {
            for frame in &self.trace {
                write!(f, "\n    at {frame}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            StorageErrorKind::Io(e) => Some(e),
            StorageErrorKind::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<StorageErrorKind> for StorageError {
    fn from(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageErrorKind::Io(err).into()
    }
}

/// Convenience result type for engine operations.
pub type StorageResult<T> = Result<T, StorageError>;
