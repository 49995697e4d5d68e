//! Multipart upload lifecycle and listing.
//!
//! Per-upload state lives entirely in the bucket's metadata directory:
//!
//! ```text
//! <root>/.minio/<bucket>/<object>/<upload-id>.uploadid      reservation
//! <root>/.minio/<bucket>/<object>/<upload-id>.<n>.<md5>     uploaded part
//! ```
//!
//! The reservation file is the upload's identity: operations on an upload
//! ID whose reservation is gone fail with `InvalidUploadId`. Completion
//! concatenates the requested parts into a temp file beside the state and
//! renames it onto the object path; the rename is single-winner, so two
//! racing completions publish at most once each and the filesystem is the
//! only serialization point.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::atomic::{self, AtomicFile};
use crate::checksums;
use crate::cursor::{Cursor, CursorKey};
use crate::error::{StorageError, StorageErrorKind, StorageResult};
use crate::ops::list::clamp_page_size;
use crate::ops::object::content_type_for;
use crate::store::{Filesystem, LIST_OBJECTS_LIMIT};
use crate::types::{
    CompletePart, ListMultipartsInfo, ListPartsInfo, ObjectInfo, PartInfo, UploadInfo,
};
use crate::validation::validate_object_prefix;
use crate::walker;

/// Suffix of upload-ID reservation files.
const UPLOAD_ID_SUFFIX: &str = ".uploadid";

/// Largest part number accepted.
const MAX_PART_NUMBER: u32 = 10_000;

/// Page cap for part listings.
const MAX_PARTS_PAGE: usize = 1000;

/// Legacy state names some deployments carry in their metadata trees;
/// multipart listings never surface them.
const SKIPPED_NAME_MARKERS: [&str; 2] = ["$multiparts", "$tmpobject"];

/// One entry produced by a metadata-tree scan: an in-flight upload, or
/// (under the `/` delimiter) a directory standing in for a common prefix.
#[derive(Debug)]
pub(crate) struct MultipartRecord {
    pub name: String,
    pub upload_id: String,
    pub initiated: DateTime<Utc>,
    pub is_dir: bool,
}

/// Item type flowing through a multipart-scan channel.
pub(crate) type MultipartItem = StorageResult<MultipartRecord>;

impl Filesystem {
    /// Initiate a multipart upload and return its upload ID.
    ///
    /// The ID is a UUIDv4 reserved by exclusively creating its reservation
    /// file; on the (vanishing) chance of a collision a fresh UUID is
    /// drawn and the reservation retried.
    pub async fn new_multipart_upload(&self, bucket: &str, object: &str) -> StorageResult<String> {
        let bucket = self.check_object_args(bucket, object).await?;
        self.check_disk_free()?;

        let metadir = self.meta_object_path(&bucket, object);
        tokio::fs::create_dir_all(&metadir).await?;

        let upload_id = loop {
            let candidate = Uuid::new_v4().to_string();
            let reservation = metadir.join(format!("{candidate}{UPLOAD_ID_SUFFIX}"));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&reservation)
                .await
            {
                Ok(_) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        };

        debug!(bucket = %bucket, object = %object, upload_id = %upload_id, "initiated multipart upload");
        Ok(upload_id)
    }

    /// Upload one part of an in-flight upload. Returns the part's ETag
    /// (its MD5 hex digest).
    ///
    /// Re-uploading the same `(part_number, md5)` pair is idempotent; a
    /// different digest for the same part number creates a sibling, and
    /// completion selects by the exact ETag the client submits.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::InvalidUploadId`] when the reservation is
    /// absent, [`StorageErrorKind::InvalidArgument`] for an out-of-range
    /// part number, [`StorageErrorKind::BadDigest`] on digest mismatch.
    pub async fn put_object_part<R>(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        part_number: u32,
        size: i64,
        reader: &mut R,
        md5_hex: &str,
    ) -> StorageResult<String>
    where
        R: tokio::io::AsyncRead + Unpin + ?Sized,
    {
        let bucket = self.check_object_args(bucket, object).await?;
        let metadir = self.check_upload_id(&bucket, object, upload_id).await?;

        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(StorageErrorKind::InvalidArgument {
                message: format!("part number must be between 1 and {MAX_PART_NUMBER}, got {part_number}"),
            }
            .into());
        }
        if !md5_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageErrorKind::InvalidArgument {
                message: format!("malformed part digest: {md5_hex:?}"),
            }
            .into());
        }
        self.check_disk_free()?;

        let part_path = metadir.join(format!("{upload_id}.{part_number}.{md5_hex}"));
        let (computed_md5, _written) = atomic::safe_write(&part_path, reader, size, md5_hex)
            .await
            .map_err(|e| e.trace(format!("writing part {part_number} of upload {upload_id}")))?;

        debug!(
            bucket = %bucket,
            object = %object,
            upload_id = %upload_id,
            part_number,
            "stored part"
        );
        Ok(computed_md5)
    }

    /// Complete an upload: concatenate the referenced parts in the
    /// client-given order and publish the object.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::InvalidPart`] when a referenced part was never
    /// uploaded (ETags are compared exactly, quotes stripped), plus the
    /// usual validation and I/O kinds.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        parts: &[CompletePart],
    ) -> StorageResult<ObjectInfo> {
        let bucket = self.check_object_args(bucket, object).await?;
        let metadir = self.check_upload_id(&bucket, object, upload_id).await?;
        self.check_disk_free()?;

        // Verify every referenced part before writing anything.
        let mut part_md5s = Vec::with_capacity(parts.len());
        for part in parts {
            let md5sum = checksums::trim_etag(&part.etag);
            if md5sum.is_empty() || !md5sum.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(StorageErrorKind::InvalidPart.into());
            }
            let part_path = metadir.join(format!("{upload_id}.{}.{md5sum}", part.part_number));
            if !walker::is_file_exist(&part_path).await? {
                return Err(StorageError::from(StorageErrorKind::InvalidPart)
                    .trace(format!("part {} with etag {md5sum}", part.part_number)));
            }
            part_md5s.push(md5sum.to_owned());
        }

        let s3_md5 = checksums::s3_multipart_etag(&part_md5s)?;

        // Concatenate into a temp file beside the upload state; the commit
        // rename onto the object path is the single-winner publish.
        let object_path = self.object_path(&bucket, object);
        let mut assembled = AtomicFile::create_with_temp_base(
            metadir.join(format!("{upload_id}.complete")),
            &object_path,
        )
        .await?;
        for (part, md5sum) in parts.iter().zip(&part_md5s) {
            let part_path = metadir.join(format!("{upload_id}.{}.{md5sum}", part.part_number));
            let mut part_file = tokio::fs::File::open(&part_path).await.map_err(|e| {
                StorageErrorKind::Internal(anyhow::anyhow!(
                    "failed to open part file {}: {e}",
                    part_path.display()
                ))
            })?;
            tokio::io::copy(&mut part_file, &mut assembled).await.map_err(|e| {
                StorageErrorKind::Internal(anyhow::anyhow!(
                    "failed to append part {} of upload {upload_id}: {e}",
                    part.part_number
                ))
            })?;
        }
        assembled.commit().await?;

        // The object is live; a cleanup failure must not unpublish it.
        if let Err(e) = self.cleanup_upload_id(&bucket, object, upload_id).await {
            warn!(
                bucket = %bucket,
                object = %object,
                upload_id = %upload_id,
                error = %e,
                "failed to clean up completed upload state"
            );
        }

        let meta = tokio::fs::metadata(&object_path).await?;
        debug!(
            bucket = %bucket,
            object = %object,
            upload_id = %upload_id,
            parts = parts.len(),
            size = meta.len(),
            "completed multipart upload"
        );

        Ok(ObjectInfo {
            bucket,
            name: object.to_owned(),
            modified: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            size: meta.len(),
            content_type: content_type_for(object),
            md5: Some(s3_md5),
        })
    }

    /// Abort an upload, deleting its reservation and every uploaded part,
    /// and pruning metadata directories its object name created.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::InvalidUploadId`] when the reservation is
    /// absent.
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        let bucket = self.check_object_args(bucket, object).await?;
        self.check_upload_id(&bucket, object, upload_id).await?;
        self.cleanup_upload_id(&bucket, object, upload_id).await?;

        debug!(bucket = %bucket, object = %object, upload_id = %upload_id, "aborted multipart upload");
        Ok(())
    }

    /// List uploaded parts of an in-flight upload, in ascending
    /// part-number order, starting strictly after `part_number_marker`.
    ///
    /// Out-of-range `max_parts` values clamp to 1000. When the page is
    /// truncated, `next_part_number_marker` carries the last emitted part
    /// number.
    pub async fn list_object_parts(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: i64,
    ) -> StorageResult<ListPartsInfo> {
        let bucket = self.check_object_args(bucket, object).await?;
        let metadir = self.check_upload_id(&bucket, object, upload_id).await?;

        let max_parts = if max_parts <= 0 || max_parts > MAX_PARTS_PAGE as i64 {
            MAX_PARTS_PAGE
        } else {
            usize::try_from(max_parts).unwrap_or(MAX_PARTS_PAGE)
        };

        let entries = walker::filtered_readdir(
            &metadir,
            |entry| {
                parse_part_name(&entry.name, upload_id)
                    .is_some_and(|(part_number, _)| part_number > part_number_marker)
            },
            false,
        )
        .await?;

        let mut parts: Vec<PartInfo> = entries
            .iter()
            .filter_map(|entry| {
                parse_part_name(&entry.name, upload_id).map(|(part_number, md5sum)| PartInfo {
                    part_number,
                    last_modified: entry.modified,
                    etag: md5sum.to_owned(),
                    size: entry.size,
                })
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);

        let is_truncated = parts.len() > max_parts;
        parts.truncate(max_parts);
        let next_part_number_marker = if is_truncated {
            parts.last().map_or(0, |p| p.part_number)
        } else {
            0
        };

        Ok(ListPartsInfo {
            bucket,
            object: object.to_owned(),
            upload_id: upload_id.to_owned(),
            part_number_marker,
            next_part_number_marker,
            max_parts,
            is_truncated,
            parts,
        })
    }

    /// List in-flight multipart uploads in `bucket`, ordered by
    /// `(object, upload_id)`, with the same prefix/marker/delimiter
    /// semantics as [`Filesystem::list_objects`] plus an upload-ID marker
    /// to resume within one object's uploads.
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        key_marker: &str,
        upload_id_marker: &str,
        delimiter: &str,
        max_uploads: i64,
    ) -> StorageResult<ListMultipartsInfo> {
        let bucket = self.check_bucket(bucket).await?;
        validate_object_prefix(prefix)?;

        if !delimiter.is_empty() && delimiter != "/" {
            return Err(StorageErrorKind::UnsupportedDelimiter {
                delimiter: delimiter.to_owned(),
            }
            .into());
        }
        if !key_marker.is_empty() && !prefix.is_empty() && !key_marker.starts_with(prefix) {
            return Err(StorageErrorKind::InvalidMarkerPrefix {
                marker: key_marker.to_owned(),
                prefix: prefix.to_owned(),
            }
            .into());
        }
        if !upload_id_marker.is_empty() {
            if key_marker.ends_with('/') {
                return Err(StorageErrorKind::InvalidArgument {
                    message: format!(
                        "invalid combination of upload-id marker {upload_id_marker:?} and marker {key_marker:?}"
                    ),
                }
                .into());
            }
            let id = Uuid::parse_str(upload_id_marker).map_err(|e| {
                StorageError::from(StorageErrorKind::InvalidArgument {
                    message: format!("malformed upload-id marker {upload_id_marker:?}: {e}"),
                })
            })?;
            if id.is_nil() {
                return Err(StorageErrorKind::InvalidArgument {
                    message: format!("invalid upload-id marker {upload_id_marker:?}"),
                }
                .into());
            }
        }

        let mut result = ListMultipartsInfo {
            key_marker: key_marker.to_owned(),
            upload_id_marker: upload_id_marker.to_owned(),
            ..ListMultipartsInfo::default()
        };
        if max_uploads == 0 {
            return Ok(result);
        }
        let max_uploads = clamp_page_size(max_uploads);
        result.max_uploads = max_uploads;
        let recursive = delimiter.is_empty();

        let key = CursorKey {
            bucket: bucket.clone(),
            delimiter: delimiter.to_owned(),
            marker: key_marker.to_owned(),
            prefix: prefix.to_owned(),
            upload_id_marker: upload_id_marker.to_owned(),
        };
        let mut cursor = self.multipart_cursors.take(&key).unwrap_or_else(|| {
            spawn_multipart_scan(
                self.meta_bucket_path(&bucket),
                prefix.to_owned(),
                key_marker.to_owned(),
                upload_id_marker.to_owned(),
                recursive,
            )
        });

        let mut last_name = String::new();
        let mut last_upload_id = String::new();
        while result.uploads.len() + result.common_prefixes.len() < max_uploads {
            let Some(item) = cursor.next().await else {
                break;
            };
            let record = item.map_err(|e| e.trace("scanning multipart metadata"))?;

            if SKIPPED_NAME_MARKERS
                .iter()
                .any(|marker| record.name.contains(marker))
            {
                continue;
            }

            last_name.clone_from(&record.name);
            last_upload_id.clone_from(&record.upload_id);
            if record.is_dir {
                result.common_prefixes.push(record.name);
            } else {
                result.uploads.push(UploadInfo {
                    object: record.name,
                    upload_id: record.upload_id,
                    initiated: record.initiated,
                });
            }
        }

        let page_full = result.uploads.len() + result.common_prefixes.len() == max_uploads;
        if page_full && cursor.peek().await.is_some() {
            result.is_truncated = true;
            result.next_key_marker = Some(last_name.clone());
            result.next_upload_id_marker = Some(last_upload_id.clone());

            let next_key = CursorKey {
                marker: last_name,
                upload_id_marker: last_upload_id,
                ..key
            };
            self.multipart_cursors.park(next_key, cursor);
        }

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Validate an upload ID and require its reservation file. Returns the
    /// upload's metadata directory.
    async fn check_upload_id(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> StorageResult<PathBuf> {
        let invalid = || {
            StorageErrorKind::InvalidUploadId {
                upload_id: upload_id.to_owned(),
            }
            .into()
        };

        // Upload IDs are always engine-generated UUIDs; anything else can
        // never have a reservation (and must not reach a path join).
        if Uuid::parse_str(upload_id).is_err() {
            return Err(invalid());
        }

        let metadir = self.meta_object_path(bucket, object);
        let reservation = metadir.join(format!("{upload_id}{UPLOAD_ID_SUFFIX}"));
        if !walker::is_file_exist(&reservation).await? {
            return Err(invalid());
        }
        Ok(metadir)
    }

    /// Remove every file of an upload and prune emptied metadata
    /// directories up to the bucket's metadata root.
    async fn cleanup_upload_id(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        let metadir = self.meta_object_path(bucket, object);
        // The reservation file `<id>.uploadid` shares the `<id>.` prefix
        // with the part files, so one sweep removes the whole upload.
        let id_prefix = format!("{upload_id}.");

        let names =
            walker::filtered_readdirnames(&metadir, |name| name.starts_with(&id_prefix)).await?;
        for name in names {
            tokio::fs::remove_file(metadir.join(name)).await?;
        }

        walker::prune_empty_dirs(&metadir, &self.meta_bucket_path(bucket)).await?;
        Ok(())
    }
}

/// Parse `<upload-id>.<part-number>.<md5hex>` file names; returns the part
/// number and digest for well-formed names of the given upload.
fn parse_part_name<'a>(name: &'a str, upload_id: &str) -> Option<(u32, &'a str)> {
    let rest = name.strip_prefix(upload_id)?.strip_prefix('.')?;
    let (number, md5sum) = rest.split_once('.')?;
    let part_number: u32 = number.parse().ok()?;
    if !(1..=MAX_PART_NUMBER).contains(&part_number) {
        return None;
    }
    if md5sum.contains('.') {
        return None;
    }
    Some((part_number, md5sum))
}

// ---------------------------------------------------------------------------
// Metadata-tree scan
// ---------------------------------------------------------------------------

struct MultipartScanParams {
    prefix: String,
    key_marker: String,
    upload_id_marker: String,
    recursive: bool,
}

impl MultipartScanParams {
    /// Whether an upload `(name, upload_id)` sorts after the markers.
    fn after_markers(&self, name: &str, upload_id: &str) -> bool {
        if name > self.key_marker.as_str() {
            return true;
        }
        !self.upload_id_marker.is_empty()
            && name == self.key_marker
            && upload_id > self.upload_id_marker.as_str()
    }
}

/// Start a metadata scan task and return its consuming cursor.
fn spawn_multipart_scan(
    meta_bucket_dir: PathBuf,
    prefix: String,
    key_marker: String,
    upload_id_marker: String,
    recursive: bool,
) -> Cursor<MultipartItem> {
    let (tx, rx) = mpsc::channel(LIST_OBJECTS_LIMIT);
    tokio::spawn(async move {
        let params = MultipartScanParams {
            prefix,
            key_marker,
            upload_id_marker,
            recursive,
        };
        let _ = scan_multipart_dir(&tx, meta_bucket_dir, String::new(), &params).await;
    });
    Cursor::new(rx)
}

/// Walk one metadata directory level in name order.
///
/// Uploads reserved at this level (object name = `rel_base` without its
/// trailing `/`) sort before everything in subdirectories, so they are
/// emitted first regardless of how the reservation file names interleave
/// with subdirectory names.
fn scan_multipart_dir<'a>(
    tx: &'a mpsc::Sender<MultipartItem>,
    dir: PathBuf,
    rel_base: String,
    params: &'a MultipartScanParams,
) -> Pin<Box<dyn Future<Output = Result<(), ()>> + Send + 'a>> {
    Box::pin(async move {
        let entries = match walker::filtered_readdir(&dir, |_| true, true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                let _ = tx.send(Err(StorageError::from(e))).await;
                return Err(());
            }
        };

        // Reservations at this level first: their object name sorts before
        // any name under a subdirectory.
        let object_name = rel_base.trim_end_matches('/');
        if !object_name.is_empty() {
            for entry in entries.iter().filter(|e| !e.is_dir) {
                let Some(upload_id) = entry.name.strip_suffix(UPLOAD_ID_SUFFIX) else {
                    continue;
                };
                if object_name.starts_with(&params.prefix)
                    && params.after_markers(object_name, upload_id)
                {
                    send_upload(tx, object_name, upload_id, entry.modified).await?;
                }
            }
        }

        for entry in entries.iter().filter(|e| e.is_dir) {
            let rel = format!("{rel_base}{}", entry.name);
            let child = dir.join(entry.name.trim_end_matches('/'));

            if params.recursive {
                if !(params.prefix.starts_with(&rel) || rel.starts_with(&params.prefix)) {
                    continue;
                }
                if !(rel.as_str() > params.key_marker.as_str()
                    || params.key_marker.starts_with(&rel))
                {
                    continue;
                }
                scan_multipart_dir(tx, child, rel, params).await?;
            } else if params.prefix.starts_with(&rel) {
                // Ancestor of the prefix: keep descending toward it.
                scan_multipart_dir(tx, child, rel, params).await?;
            } else if rel.starts_with(&params.prefix) {
                scan_delimited_entry(tx, child, rel, params).await?;
            }
        }
        Ok(())
    })
}

/// Under the `/` delimiter: emit uploads reserved directly inside `dir`
/// (they belong to the object at this level) and, if the directory holds
/// deeper structure, one common prefix for it.
async fn scan_delimited_entry(
    tx: &mpsc::Sender<MultipartItem>,
    dir: PathBuf,
    rel: String,
    params: &MultipartScanParams,
) -> Result<(), ()> {
    let entries = match walker::filtered_readdir(&dir, |_| true, true).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            let _ = tx.send(Err(StorageError::from(e))).await;
            return Err(());
        }
    };

    let object_name = rel.trim_end_matches('/');
    let mut modified = DateTime::<Utc>::default();
    let mut has_subdirs = false;
    for entry in &entries {
        if entry.is_dir {
            has_subdirs = true;
            continue;
        }
        let Some(upload_id) = entry.name.strip_suffix(UPLOAD_ID_SUFFIX) else {
            continue;
        };
        if object_name.starts_with(&params.prefix)
            && params.after_markers(object_name, upload_id)
        {
            send_upload(tx, object_name, upload_id, entry.modified).await?;
        }
        modified = modified.max(entry.modified);
    }

    if has_subdirs && rel.as_str() > params.key_marker.as_str() {
        let record = MultipartRecord {
            name: rel,
            upload_id: String::new(),
            initiated: modified,
            is_dir: true,
        };
        tx.send(Ok(record)).await.map_err(|_| ())?;
    }
    Ok(())
}

async fn send_upload(
    tx: &mpsc::Sender<MultipartItem>,
    name: &str,
    upload_id: &str,
    initiated: DateTime<Utc>,
) -> Result<(), ()> {
    let record = MultipartRecord {
        name: name.to_owned(),
        upload_id: upload_id.to_owned(),
        initiated,
        is_dir: false,
    };
    tx.send(Ok(record)).await.map_err(|_| ())
}
