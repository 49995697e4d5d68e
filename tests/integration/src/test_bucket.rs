//! Bucket lifecycle, end to end.

#[cfg(test)]
mod tests {
    use rustio_fs::StorageErrorKind;

    use crate::helpers::{put, test_store};

    #[tokio::test]
    async fn test_should_cycle_make_delete_make() {
        let (_dir, fs) = test_store().await;

        fs.make_bucket("cycle").await.unwrap();
        fs.delete_bucket("cycle").await.unwrap();
        fs.make_bucket("cycle").await.unwrap();

        let buckets = fs.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "cycle");
    }

    #[tokio::test]
    async fn test_should_keep_buckets_isolated() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("one").await.unwrap();
        fs.make_bucket("two").await.unwrap();

        put(&fs, "one", "only-in-one", b"1").await;

        let listing = fs.list_objects("two", "", "", "", 10).await.unwrap();
        assert!(listing.objects.is_empty());

        let err = fs.get_object("two", "only-in-one", 0, None).await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_block_deletion_until_bucket_is_empty() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("busy").await.unwrap();
        put(&fs, "busy", "blocker", b"here").await;

        let err = fs.delete_bucket("busy").await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BucketNotEmpty { .. }));

        fs.delete_object("busy", "blocker").await.unwrap();
        fs.delete_bucket("busy").await.unwrap();
    }

    #[tokio::test]
    async fn test_should_resolve_bucket_case_insensitively() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("lower").await.unwrap();

        // Uppercase spellings are invalid names; the canonical lowercase
        // form is the only way in, and a second creation attempt against
        // any casing of an existing name must not succeed.
        let err = fs.make_bucket("lower").await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BucketExists { .. }));
    }

    #[tokio::test]
    async fn test_should_report_creation_time() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("timed").await.unwrap();

        let info = fs.bucket_info("timed").await.unwrap();
        let age = (chrono::Utc::now() - info.created).num_seconds().abs();
        assert!(age < 60, "creation time should be recent, was {age}s ago");
    }
}
