//! Object round-trips through the safe write pipeline.

#[cfg(test)]
mod tests {
    use rustio_fs::StorageErrorKind;
    use rustio_fs::checksums::md5_hex;

    use crate::helpers::{put, test_store};

    #[tokio::test]
    async fn test_should_return_exact_bytes_and_etag_after_put() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();

        let data = b"the quick brown fox";
        let info = fs
            .put_object("bkt", "fox.txt", data.len() as i64, &mut &data[..], None)
            .await
            .unwrap();

        assert_eq!(info.md5.as_deref(), Some(md5_hex(data).as_str()));
        assert_eq!(info.size, data.len() as u64);

        let read = fs.get_object("bkt", "fox.txt", 0, None).await.unwrap();
        assert_eq!(read.as_ref(), data);
    }

    #[tokio::test]
    async fn test_should_verify_supplied_digest() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();

        let data = b"digest checked";
        let digest = md5_hex(data);
        fs.put_object("bkt", "ok", data.len() as i64, &mut &data[..], Some(&digest))
            .await
            .unwrap();

        let err = fs
            .put_object(
                "bkt",
                "rejected",
                data.len() as i64,
                &mut &data[..],
                Some("00000000000000000000000000000000"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BadDigest { .. }));

        // Nothing was published for the rejected write.
        let err = fs.get_object("bkt", "rejected", 0, None).await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_overwrite_object_in_place() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();

        put(&fs, "bkt", "versioned", b"first").await;
        put(&fs, "bkt", "versioned", b"second, longer contents").await;

        let read = fs.get_object("bkt", "versioned", 0, None).await.unwrap();
        assert_eq!(read.as_ref(), b"second, longer contents");
    }

    #[tokio::test]
    async fn test_should_leave_no_temp_files_behind() {
        let (dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();
        put(&fs, "bkt", "a", b"payload a").await;
        put(&fs, "bkt", "nested/b", b"payload b").await;

        let mut stack = vec![dir.path().join("bkt")];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let entry = entry.unwrap();
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    stack.push(entry.path());
                } else {
                    assert!(
                        name == "a" || name == "b",
                        "unexpected leftover file: {name}"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_should_make_object_visible_to_listing_after_put() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();

        put(&fs, "bkt", "seen", b"visible").await;
        let listing = fs.list_objects("bkt", "", "", "", 10).await.unwrap();
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].name, "seen");
        assert_eq!(listing.objects[0].size, 7);
    }

    #[tokio::test]
    async fn test_should_delete_and_then_miss_object() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();
        put(&fs, "bkt", "doomed", b"bye").await;

        fs.delete_object("bkt", "doomed").await.unwrap();

        let err = fs.get_object("bkt", "doomed", 0, None).await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::ObjectNotFound { .. }));
        let listing = fs.list_objects("bkt", "", "", "", 10).await.unwrap();
        assert!(listing.objects.is_empty());
    }

    #[tokio::test]
    async fn test_should_stream_from_reader_without_size() {
        let (_dir, fs) = test_store().await;
        fs.make_bucket("bkt").await.unwrap();

        let data = b"unsized stream";
        let info = fs
            .put_object("bkt", "stream", -1, &mut &data[..], None)
            .await
            .unwrap();
        assert_eq!(info.size, data.len() as u64);
    }
}
