//! End-to-end tests for the Rustio engine.
//!
//! Each test opens a store rooted in its own temp directory and drives the
//! engine API directly; there is no server in between.

use rustio_fs::Filesystem;

/// Shared fixtures for the test modules.
pub mod helpers {
    use super::Filesystem;

    /// Open a fresh store in a temp directory. The `TempDir` guard must be
    /// kept alive for the duration of the test.
    pub async fn test_store() -> (tempfile::TempDir, Filesystem) {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = Filesystem::new(dir.path()).await.expect("open store");
        (dir, fs)
    }

    /// Store `data` under `bucket/object`, asserting success.
    pub async fn put(fs: &Filesystem, bucket: &str, object: &str, data: &[u8]) {
        fs.put_object(bucket, object, data.len() as i64, &mut &data[..], None)
            .await
            .unwrap_or_else(|e| panic!("put_object {bucket}/{object} failed: {e}"));
    }
}

mod test_bucket;
mod test_config;
mod test_multipart;
mod test_object;
mod test_policy;
