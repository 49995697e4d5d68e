//! Paginated object listing.
//!
//! A listing call drains up to one page from a lazy directory scan running
//! on its own task. The scan is a pruned depth-first walk of the bucket
//! directory in byte-wise name order: subtrees that sort entirely at or
//! before the marker, or that cannot match the prefix, are never read.
//! With the `/` delimiter, matching directories are emitted once as common
//! prefixes instead of being descended.
//!
//! Truncated pages park their scan state in the cursor pool keyed by the
//! *next* page's parameters, so sequential pagination over a large bucket
//! costs O(page) per call rather than O(bucket).

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cursor::{Cursor, CursorKey};
use crate::error::{StorageError, StorageErrorKind, StorageResult};
use crate::ops::object::content_type_for;
use crate::store::{Filesystem, LIST_OBJECTS_LIMIT};
use crate::types::{ListObjectsInfo, ObjectInfo};
use crate::validation::validate_object_prefix;
use crate::walker;

/// One entry produced by a bucket scan: an object, or (under the `/`
/// delimiter) a directory standing in for a common prefix.
#[derive(Debug)]
pub(crate) struct ObjectRecord {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub is_dir: bool,
}

/// Item type flowing through an object-scan channel.
pub(crate) type ObjectItem = StorageResult<ObjectRecord>;

struct ScanParams {
    prefix: String,
    marker: String,
    recursive: bool,
}

impl Filesystem {
    /// List objects in `bucket` under `prefix`, starting strictly after
    /// `marker`, with S3 delimiter semantics.
    ///
    /// - `delimiter` must be `""` (recursive) or `"/"` (roll up one level
    ///   of hierarchy into common prefixes).
    /// - A non-empty `marker` combined with a non-empty `prefix` must have
    ///   that prefix.
    /// - `max_keys == 0` returns an empty, untruncated page; negative or
    ///   oversized values clamp to [`LIST_OBJECTS_LIMIT`].
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::UnsupportedDelimiter`],
    /// [`StorageErrorKind::InvalidMarkerPrefix`],
    /// [`StorageErrorKind::BucketNotFound`], or an I/O kind from the scan.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i64,
    ) -> StorageResult<ListObjectsInfo> {
        let bucket = self.check_bucket(bucket).await?;
        validate_object_prefix(prefix)?;

        if !delimiter.is_empty() && delimiter != "/" {
            return Err(StorageErrorKind::UnsupportedDelimiter {
                delimiter: delimiter.to_owned(),
            }
            .into());
        }

        if !marker.is_empty() && !prefix.is_empty() && !marker.starts_with(prefix) {
            return Err(StorageErrorKind::InvalidMarkerPrefix {
                marker: marker.to_owned(),
                prefix: prefix.to_owned(),
            }
            .into());
        }

        if max_keys == 0 {
            return Ok(ListObjectsInfo::default());
        }
        let max_keys = clamp_page_size(max_keys);
        let recursive = delimiter.is_empty();

        let key = CursorKey {
            bucket: bucket.clone(),
            delimiter: delimiter.to_owned(),
            marker: marker.to_owned(),
            prefix: prefix.to_owned(),
            upload_id_marker: String::new(),
        };
        let mut cursor = self.object_cursors.take(&key).unwrap_or_else(|| {
            spawn_object_scan(
                self.bucket_path(&bucket),
                prefix.to_owned(),
                marker.to_owned(),
                recursive,
            )
        });

        let mut result = ListObjectsInfo::default();
        let mut last_emitted: Option<String> = None;

        while result.objects.len() + result.common_prefixes.len() < max_keys {
            let Some(item) = cursor.next().await else {
                break;
            };
            let record = item.map_err(|e| e.trace("scanning bucket directory"))?;

            if record.is_dir {
                result.common_prefixes.push(record.name.clone());
            } else {
                result.objects.push(ObjectInfo {
                    bucket: bucket.clone(),
                    name: record.name.clone(),
                    modified: record.modified,
                    size: record.size,
                    content_type: content_type_for(&record.name),
                    md5: None,
                });
            }
            last_emitted = Some(record.name);
        }

        let page_full = result.objects.len() + result.common_prefixes.len() == max_keys;
        if page_full && cursor.peek().await.is_some() {
            result.is_truncated = true;
            result.next_marker = last_emitted.clone();

            // Park the live scan under the parameters the next page will
            // arrive with.
            let next_key = CursorKey {
                marker: last_emitted.unwrap_or_default(),
                ..key
            };
            self.object_cursors.park(next_key, cursor);
        }

        debug!(
            bucket = %bucket,
            prefix = %prefix,
            objects = result.objects.len(),
            common_prefixes = result.common_prefixes.len(),
            is_truncated = result.is_truncated,
            "listed objects"
        );
        Ok(result)
    }
}

/// Clamp a requested page size to `[1, LIST_OBJECTS_LIMIT]`.
pub(crate) fn clamp_page_size(max_keys: i64) -> usize {
    if max_keys < 0 || max_keys > LIST_OBJECTS_LIMIT as i64 {
        LIST_OBJECTS_LIMIT
    } else {
        usize::try_from(max_keys).unwrap_or(LIST_OBJECTS_LIMIT)
    }
}

/// Start a bucket scan task and return its consuming cursor.
fn spawn_object_scan(
    bucket_dir: PathBuf,
    prefix: String,
    marker: String,
    recursive: bool,
) -> Cursor<ObjectItem> {
    let (tx, rx) = mpsc::channel(LIST_OBJECTS_LIMIT);
    tokio::spawn(async move {
        let params = ScanParams {
            prefix,
            marker,
            recursive,
        };
        // A send failure means the consumer dropped the cursor; the scan
        // just stops.
        let _ = scan_dir(&tx, bucket_dir, String::new(), &params).await;
    });
    Cursor::new(rx)
}

/// Walk one directory level, in name order, emitting matching entries.
///
/// `rel_base` is the object-name prefix of `dir` relative to the bucket
/// root (empty at the top, otherwise ending in `/`).
fn scan_dir<'a>(
    tx: &'a mpsc::Sender<ObjectItem>,
    dir: PathBuf,
    rel_base: String,
    params: &'a ScanParams,
) -> Pin<Box<dyn Future<Output = Result<(), ()>> + Send + 'a>> {
    Box::pin(async move {
        let entries = match walker::filtered_readdir(&dir, |_| true, true).await {
            Ok(entries) => entries,
            // A missing directory is an empty listing: the bucket (or a
            // prefix level) vanished or never existed.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                let _ = tx.send(Err(StorageError::from(e))).await;
                return Err(());
            }
        };

        for entry in entries {
            let rel = format!("{rel_base}{}", entry.name);

            if entry.is_dir {
                let child = dir.join(entry.name.trim_end_matches('/'));
                if params.recursive {
                    // Prune: descend only when the subtree can still yield
                    // names matching the prefix and sorting after the marker.
                    if !(params.prefix.starts_with(&rel) || rel.starts_with(&params.prefix)) {
                        continue;
                    }
                    if !(rel.as_str() > params.marker.as_str()
                        || params.marker.starts_with(&rel))
                    {
                        continue;
                    }
                    scan_dir(tx, child, rel, params).await?;
                } else if params.prefix.starts_with(&rel) {
                    // Ancestor of the prefix: keep descending toward it.
                    scan_dir(tx, child, rel, params).await?;
                } else if rel.starts_with(&params.prefix) && rel.as_str() > params.marker.as_str()
                {
                    // Delimited listing: one common prefix, no descent.
                    send(tx, entry_record(rel, &entry)).await?;
                }
            } else if rel.as_str() > params.marker.as_str() && rel.starts_with(&params.prefix) {
                send(tx, entry_record(rel, &entry)).await?;
            }
        }
        Ok(())
    })
}

fn entry_record(rel: String, entry: &walker::DirEntry) -> ObjectRecord {
    ObjectRecord {
        name: rel,
        modified: entry.modified,
        size: entry.size,
        is_dir: entry.is_dir,
    }
}

async fn send(tx: &mpsc::Sender<ObjectItem>, record: ObjectRecord) -> Result<(), ()> {
    tx.send(Ok(record)).await.map_err(|_| ())
}
