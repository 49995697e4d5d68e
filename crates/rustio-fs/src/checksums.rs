//! MD5 digests and ETag construction.
//!
//! Single-shot objects carry a plain hex MD5 as their ETag. Objects
//! assembled from multipart uploads carry the composite form
//! `<hex(md5(concat(part digests)))>-<part count>`, where the concatenation
//! is over the *decoded* MD5 bytes of each part in upload order.

use digest::Digest;
use md5::Md5;

use crate::error::{StorageErrorKind, StorageResult};

/// Compute the hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// assert_eq!(
///     rustio_fs::checksums::md5_hex(b"hello"),
///     "5d41402abc4b2a76b9719d911017c592"
/// );
/// ```
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Strip the surrounding double quotes an S3 client may put around an ETag.
#[must_use]
pub fn trim_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}

/// Compute the composite multipart ETag from the per-part MD5 hex digests,
/// in upload order.
///
/// # Errors
///
/// Returns [`StorageErrorKind::InvalidArgument`] if any digest is not valid
/// hex.
pub fn s3_multipart_etag<S: AsRef<str>>(part_md5_hexes: &[S]) -> StorageResult<String> {
    let mut concat = Vec::with_capacity(part_md5_hexes.len() * 16);
    for md5sum in part_md5_hexes {
        let bytes = hex::decode(md5sum.as_ref()).map_err(|e| StorageErrorKind::InvalidArgument {
            message: format!("malformed part digest {:?}: {e}", md5sum.as_ref()),
        })?;
        concat.extend_from_slice(&bytes);
    }
    Ok(format!(
        "{}-{}",
        hex::encode(Md5::digest(&concat)),
        part_md5_hexes.len()
    ))
}

/// Compare two hex MD5 digests for equality, ignoring case.
#[must_use]
pub fn md5_hex_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
