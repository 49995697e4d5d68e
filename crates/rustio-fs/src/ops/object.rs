//! Single-shot object operations: put, get, stat, delete.

use std::io::SeekFrom;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::atomic;
use crate::error::{StorageErrorKind, StorageResult};
use crate::store::Filesystem;
use crate::types::ObjectInfo;
use crate::walker;

/// Fallback content type when the extension is unknown.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Derive a content type from an object name's extension.
pub(crate) fn content_type_for(object: &str) -> String {
    mime_guess::from_path(object)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_owned()
}

impl Filesystem {
    /// Store an object from a streamed reader.
    ///
    /// When `size >= 0`, exactly `size` bytes are consumed; when negative,
    /// the reader is drained to EOF. A non-empty `expected_md5` hex digest
    /// is verified against the received bytes before the object becomes
    /// visible; on mismatch nothing is published.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BadDigest`] on digest mismatch, plus the usual
    /// validation and I/O kinds.
    pub async fn put_object<R>(
        &self,
        bucket: &str,
        object: &str,
        size: i64,
        reader: &mut R,
        expected_md5: Option<&str>,
    ) -> StorageResult<ObjectInfo>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let bucket = self.check_object_args(bucket, object).await?;
        self.check_disk_free()?;

        let path = self.object_path(&bucket, object);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let expected = expected_md5.unwrap_or("");
        let (md5_hex, _written) = atomic::safe_write(&path, reader, size, expected)
            .await
            .map_err(|e| e.trace(format!("writing object {bucket}/{object}")))?;

        let meta = tokio::fs::metadata(&path).await?;
        debug!(bucket = %bucket, object = %object, size = meta.len(), "put object");

        Ok(ObjectInfo {
            bucket,
            name: object.to_owned(),
            modified: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            size: meta.len(),
            content_type: content_type_for(object),
            md5: Some(md5_hex),
        })
    }

    /// Read an object, or a byte range of it.
    ///
    /// `offset` past the end of the object is rejected; a `length` reaching
    /// past the end is clipped to EOF.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::ObjectNotFound`] when the object is absent (or
    /// the path resolves to a directory rather than a stored object).
    pub async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        offset: u64,
        length: Option<u64>,
    ) -> StorageResult<Bytes> {
        let bucket = self.check_object_args(bucket, object).await?;
        let path = self.object_path(&bucket, object);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => {
                return Err(not_found(&bucket, object));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(&bucket, object));
            }
            Err(e) => return Err(e.into()),
        };

        if offset > meta.len() {
            return Err(StorageErrorKind::InvalidArgument {
                message: format!(
                    "offset {offset} is beyond the object size {}",
                    meta.len()
                ),
            }
            .into());
        }

        if offset == 0 && length.is_none() {
            let data = tokio::fs::read(&path).await?;
            return Ok(Bytes::from(data));
        }

        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let available = meta.len() - offset;
        let to_read = length.map_or(available, |l| l.min(available));
        let mut buf = Vec::with_capacity(usize::try_from(to_read).unwrap_or(0));
        file.take(to_read).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Stat an object.
    ///
    /// No digest is computed here: the MD5 of an already-stored object is
    /// only known at write time.
    pub async fn get_object_info(&self, bucket: &str, object: &str) -> StorageResult<ObjectInfo> {
        let bucket = self.check_object_args(bucket, object).await?;
        let path = self.object_path(&bucket, object);

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(not_found(&bucket, object)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(&bucket, object));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ObjectInfo {
            bucket,
            name: object.to_owned(),
            modified: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            size: meta.len(),
            content_type: content_type_for(object),
            md5: None,
        })
    }

    /// Delete an object, pruning directory levels its name created once
    /// they are empty.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::ObjectNotFound`] when the object is absent.
    pub async fn delete_object(&self, bucket: &str, object: &str) -> StorageResult<()> {
        let bucket = self.check_object_args(bucket, object).await?;
        let path = self.object_path(&bucket, object);

        if !walker::is_file_exist(&path).await? {
            return Err(not_found(&bucket, object));
        }

        walker::remove_file_and_prune(&path, &self.bucket_path(&bucket)).await?;
        debug!(bucket = %bucket, object = %object, "deleted object");
        Ok(())
    }
}

fn not_found(bucket: &str, object: &str) -> crate::error::StorageError {
    StorageErrorKind::ObjectNotFound {
        bucket: bucket.to_owned(),
        object: object.to_owned(),
    }
    .into()
}
