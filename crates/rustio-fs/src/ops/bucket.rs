//! Bucket operations: create, stat, list, delete.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{StorageErrorKind, StorageResult};
use crate::store::Filesystem;
use crate::types::BucketInfo;
use crate::validation::validate_bucket_name;
use crate::walker;

impl Filesystem {
    /// Create a bucket directory.
    ///
    /// Bucket names are case-insensitively unique: creating `Photos` when
    /// `photos` exists fails (names are validated to be lowercase anyway,
    /// so this guards against a pre-seeded storage root).
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BucketNameInvalid`] or
    /// [`StorageErrorKind::BucketExists`].
    pub async fn make_bucket(&self, bucket: &str) -> StorageResult<()> {
        validate_bucket_name(bucket)?;

        let actual = self.actual_bucket_name(bucket).await?;
        let path = self.bucket_path(&actual);
        if walker::is_dir_exist(&path).await? {
            return Err(StorageErrorKind::BucketExists { bucket: actual }.into());
        }

        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(&path).await?;

        info!(bucket = %actual, "created bucket");
        Ok(())
    }

    /// Stat a bucket.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BucketNotFound`] if the directory is absent.
    pub async fn bucket_info(&self, bucket: &str) -> StorageResult<BucketInfo> {
        let bucket = self.check_bucket(bucket).await?;
        let meta = tokio::fs::metadata(self.bucket_path(&bucket)).await?;
        let created = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();
        Ok(BucketInfo {
            name: bucket,
            created,
        })
    }

    /// List all buckets, sorted by name.
    ///
    /// Only directories with valid bucket names are reported; the metadata
    /// directory and anything else living under the root is ignored.
    pub async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        let entries = walker::filtered_readdir(
            self.root(),
            |entry| {
                entry.is_dir && validate_bucket_name(entry.name.trim_end_matches('/')).is_ok()
            },
            true,
        )
        .await?;

        Ok(entries
            .into_iter()
            .map(|entry| BucketInfo {
                name: entry.name.trim_end_matches('/').to_owned(),
                created: entry.modified,
            })
            .collect())
    }

    /// Delete an empty bucket, sweeping any metadata (policy, stale
    /// multipart state) left for it.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BucketNotFound`] or
    /// [`StorageErrorKind::BucketNotEmpty`].
    pub async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        let bucket = self.check_bucket(bucket).await?;

        match tokio::fs::remove_dir(self.bucket_path(&bucket)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
                return Err(StorageErrorKind::BucketNotEmpty { bucket }.into());
            }
            Err(e) => return Err(e.into()),
        }

        let meta = self.meta_bucket_path(&bucket);
        if walker::is_dir_exist(&meta).await? {
            tokio::fs::remove_dir_all(&meta).await?;
        }

        info!(bucket = %bucket, "deleted bucket");
        Ok(())
    }
}
