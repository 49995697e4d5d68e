//! The engine handle: storage root layout and shared state.
//!
//! A [`Filesystem`] turns a directory tree into an S3-semantics object
//! store:
//!
//! ```text
//! <root>/<bucket>/<object path>                      published objects
//! <root>/.minio/<bucket>/<object>/<uuid>.uploadid    upload reservations
//! <root>/.minio/<bucket>/<object>/<uuid>.<n>.<md5>   uploaded parts
//! <root>/.minio/<bucket>/access-policy.json          bucket policy
//! ```
//!
//! All operations take `&self` and are safe to call concurrently; the
//! filesystem rename is the linearization point for every publish.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::cursor::CursorPool;
use crate::disk::{self, DiskInfoProvider};
use crate::error::{StorageErrorKind, StorageResult};
use crate::ops::list::ObjectItem;
use crate::ops::multipart::MultipartItem;
use crate::validation::{validate_bucket_name, validate_object_name};
use crate::walker;

/// Name of the metadata directory under the storage root.
pub(crate) const META_DIR: &str = ".minio";

/// Hard cap on listing page sizes; out-of-range requests clamp to this.
pub const LIST_OBJECTS_LIMIT: usize = 1000;

/// Default free-disk floor, in percent of usable capacity.
const DEFAULT_MIN_FREE_DISK_PERCENT: i64 = 10;

/// A filesystem-backed object store rooted at one directory.
pub struct Filesystem {
    root: PathBuf,
    min_free_disk: i64,
    disk: Option<Arc<dyn DiskInfoProvider>>,
    pub(crate) object_cursors: CursorPool<ObjectItem>,
    pub(crate) multipart_cursors: CursorPool<MultipartItem>,
}

impl fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filesystem")
            .field("root", &self.root)
            .field("min_free_disk", &self.min_free_disk)
            .field("disk_check", &self.disk.is_some())
            .finish_non_exhaustive()
    }
}

impl Filesystem {
    /// Open (creating if necessary) a store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tokio::fs::create_dir_all(root.join(META_DIR)).await?;

        info!(root = %root.display(), "opened object store");
        Ok(Self {
            root,
            min_free_disk: DEFAULT_MIN_FREE_DISK_PERCENT,
            disk: None,
            object_cursors: CursorPool::new(),
            multipart_cursors: CursorPool::new(),
        })
    }

    /// Enable the free-disk admission check, rejecting writes once the free
    /// share of usable capacity drops to `min_free_percent` or below.
    #[must_use]
    pub fn with_disk_provider(
        mut self,
        provider: Arc<dyn DiskInfoProvider>,
        min_free_percent: i64,
    ) -> Self {
        self.disk = Some(provider);
        self.min_free_disk = min_free_percent;
        self
    }

    /// The storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn check_disk_free(&self) -> StorageResult<()> {
        match &self.disk {
            None => Ok(()),
            Some(provider) => disk::check_disk_free(&self.root, provider.as_ref(), self.min_free_disk),
        }
    }

    pub(crate) fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    pub(crate) fn meta_bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(META_DIR).join(bucket)
    }

    /// Join an object name onto a base path component-wise, so names keep
    /// their `/` separators byte-identically on any platform.
    pub(crate) fn join_object(base: PathBuf, object: &str) -> PathBuf {
        let mut path = base;
        for component in object.split('/') {
            path.push(component);
        }
        path
    }

    pub(crate) fn object_path(&self, bucket: &str, object: &str) -> PathBuf {
        Self::join_object(self.bucket_path(bucket), object)
    }

    pub(crate) fn meta_object_path(&self, bucket: &str, object: &str) -> PathBuf {
        Self::join_object(self.meta_bucket_path(bucket), object)
    }

    /// Resolve a bucket name to its canonical on-disk form,
    /// case-insensitively. Returns the input unchanged when no directory
    /// matches; existence is the caller's check.
    pub(crate) async fn actual_bucket_name(&self, bucket: &str) -> StorageResult<String> {
        let names = walker::filtered_readdirnames(&self.root, |name| {
            name.eq_ignore_ascii_case(bucket)
        })
        .await?;
        Ok(names
            .into_iter()
            .next()
            .unwrap_or_else(|| bucket.to_owned()))
    }

    /// Validate a bucket argument and resolve it to the canonical existing
    /// bucket, or fail with `BucketNameInvalid` / `BucketNotFound`.
    pub(crate) async fn check_bucket(&self, bucket: &str) -> StorageResult<String> {
        validate_bucket_name(bucket)?;
        let actual = self.actual_bucket_name(bucket).await?;
        if !walker::is_dir_exist(&self.bucket_path(&actual)).await? {
            return Err(StorageErrorKind::BucketNotFound {
                bucket: actual,
            }
            .into());
        }
        Ok(actual)
    }

    /// Validate `(bucket, object)` arguments for multipart and object
    /// operations, resolving the canonical bucket name.
    pub(crate) async fn check_object_args(
        &self,
        bucket: &str,
        object: &str,
    ) -> StorageResult<String> {
        let bucket = self.check_bucket(bucket).await?;
        validate_object_name(object)?;
        Ok(bucket)
    }
}
