//! Public result types returned by the engine.

use chrono::{DateTime, Utc};

/// A bucket and its creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Canonical bucket name.
    pub name: String,
    /// Creation time (directory mtime).
    pub created: DateTime<Utc>,
}

/// Metadata for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object name.
    pub name: String,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
    /// Content type derived from the name's extension.
    pub content_type: String,
    /// MD5 hex digest for single-shot objects, composite
    /// `<md5hex>-<parts>` for multipart objects. `None` when the engine
    /// did not compute one (stat and listing paths).
    pub md5: Option<String>,
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsInfo {
    /// Objects on this page, in byte-wise ascending name order.
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes rolled up under the requested delimiter.
    pub common_prefixes: Vec<String>,
    /// Whether more matching entries exist beyond this page.
    pub is_truncated: bool,
    /// Name to pass as `marker` for the next page; set only when truncated.
    pub next_marker: Option<String>,
}

/// One part of an in-flight multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    /// Part number in [1, 10000].
    pub part_number: u32,
    /// Upload time of the part.
    pub last_modified: DateTime<Utc>,
    /// MD5 hex digest of the part (its ETag).
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
}

/// One page of parts for an upload ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPartsInfo {
    /// Bucket holding the upload.
    pub bucket: String,
    /// Object the upload targets.
    pub object: String,
    /// The upload ID.
    pub upload_id: String,
    /// Marker this page started after.
    pub part_number_marker: u32,
    /// Marker for the next page: the last emitted part number when
    /// truncated, 0 otherwise.
    pub next_part_number_marker: u32,
    /// Page size cap applied.
    pub max_parts: usize,
    /// Whether more parts exist beyond this page.
    pub is_truncated: bool,
    /// Parts on this page, in ascending part-number order.
    pub parts: Vec<PartInfo>,
}

/// A part reference supplied by the client at completion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletePart {
    /// Part number.
    pub part_number: u32,
    /// The part's ETag as uploaded (quotes tolerated).
    pub etag: String,
}

/// An in-flight multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    /// Object the upload targets.
    pub object: String,
    /// The upload ID.
    pub upload_id: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
}

/// One page of in-flight multipart uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMultipartsInfo {
    /// Uploads on this page, ordered by `(object, upload_id)`.
    pub uploads: Vec<UploadInfo>,
    /// Common prefixes rolled up under the requested delimiter.
    pub common_prefixes: Vec<String>,
    /// Key marker this page started after.
    pub key_marker: String,
    /// Upload-ID marker this page started after.
    pub upload_id_marker: String,
    /// Key marker for the next page; set only when truncated.
    pub next_key_marker: Option<String>,
    /// Upload-ID marker for the next page; set only when truncated.
    pub next_upload_id_marker: Option<String>,
    /// Page size cap applied.
    pub max_uploads: usize,
    /// Whether more uploads exist beyond this page.
    pub is_truncated: bool,
}
