//! Bucket and object name validation.
//!
//! Bucket names follow the restrictive DNS-compatible subset: 3-63
//! characters of lowercase letters, digits, hyphens, and dots, starting and
//! ending alphanumeric, with no consecutive dots and no IPv4-literal shape.
//! Object names are near-arbitrary UTF-8 up to 1024 bytes; the rules here
//! exist to keep them representable as relative paths under the bucket
//! directory.

use std::net::Ipv4Addr;

use crate::error::{StorageErrorKind, StorageResult};

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Maximum object name length in bytes.
const MAX_OBJECT_NAME_BYTES: usize = 1024;

/// Validate an S3 bucket name.
///
/// # Errors
///
/// Returns [`StorageErrorKind::BucketNameInvalid`] when any rule is
/// violated.
///
/// # Examples
///
/// ```
/// use rustio_fs::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("a-b.c").is_ok());
/// assert!(validate_bucket_name("Test").is_err());
/// ```
pub fn validate_bucket_name(bucket: &str) -> StorageResult<()> {
    let invalid = || {
        StorageErrorKind::BucketNameInvalid {
            bucket: bucket.to_owned(),
        }
        .into()
    };

    let len = bucket.len();
    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(invalid());
    }

    if !bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid());
    }

    let first = bucket.as_bytes()[0];
    let last = bucket.as_bytes()[len - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid());
    }

    if bucket.contains("..") {
        return Err(invalid());
    }

    if bucket.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid());
    }

    Ok(())
}

/// Validate an S3 object name.
///
/// Rules:
/// - 1-1024 bytes of UTF-8 (enforced by the `&str` type)
/// - no NUL bytes
/// - no `..` path components
/// - no leading or trailing `/` (a trailing slash has no regular-file
///   representation on the backing filesystem)
///
/// # Errors
///
/// Returns [`StorageErrorKind::ObjectNameInvalid`] when any rule is
/// violated.
pub fn validate_object_name(object: &str) -> StorageResult<()> {
    if object.is_empty() {
        return Err(StorageErrorKind::ObjectNameInvalid {
            object: object.to_owned(),
        }
        .into());
    }
    validate_object_component_rules(object)?;
    if object.starts_with('/') || object.ends_with('/') {
        return Err(StorageErrorKind::ObjectNameInvalid {
            object: object.to_owned(),
        }
        .into());
    }
    Ok(())
}

/// Validate an object name prefix.
///
/// Prefixes follow the object name rules except that they may be empty and
/// may end with `/`.
///
/// # Errors
///
/// Returns [`StorageErrorKind::ObjectNameInvalid`] when any rule is
/// violated.
pub fn validate_object_prefix(prefix: &str) -> StorageResult<()> {
    if prefix.is_empty() {
        return Ok(());
    }
    validate_object_component_rules(prefix)?;
    if prefix.starts_with('/') {
        return Err(StorageErrorKind::ObjectNameInvalid {
            object: prefix.to_owned(),
        }
        .into());
    }
    Ok(())
}

fn validate_object_component_rules(name: &str) -> StorageResult<()> {
    let invalid = || {
        StorageErrorKind::ObjectNameInvalid {
            object: name.to_owned(),
        }
        .into()
    };

    if name.len() > MAX_OBJECT_NAME_BYTES {
        return Err(invalid());
    }
    if name.contains('\0') {
        return Err(invalid());
    }
    if name.split('/').any(|component| component == "..") {
        return Err(invalid());
    }
    Ok(())
}
