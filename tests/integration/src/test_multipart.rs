//! Multipart upload lifecycle, end to end.

#[cfg(test)]
mod tests {
    use rustio_fs::checksums::{md5_hex, s3_multipart_etag};
    use rustio_fs::types::CompletePart;
    use rustio_fs::{Filesystem, StorageErrorKind};

    use crate::helpers::test_store;

    async fn store_with_bucket() -> (tempfile::TempDir, Filesystem) {
        let (dir, fs) = test_store().await;
        fs.make_bucket("uploads").await.unwrap();
        (dir, fs)
    }

    async fn put_part(
        fs: &Filesystem,
        object: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> String {
        fs.put_object_part(
            "uploads",
            object,
            upload_id,
            part_number,
            data.len() as i64,
            &mut &data[..],
            &md5_hex(data),
        )
        .await
        .unwrap_or_else(|e| panic!("put part {part_number} failed: {e}"))
    }

    #[tokio::test]
    async fn test_should_assemble_hello_world_from_two_parts() {
        let (_dir, fs) = store_with_bucket().await;

        let upload_id = fs.new_multipart_upload("uploads", "big").await.unwrap();
        let etag1 = put_part(&fs, "big", &upload_id, 1, b"hello").await;
        let etag2 = put_part(&fs, "big", &upload_id, 2, b"world").await;

        let info = fs
            .complete_multipart_upload(
                "uploads",
                "big",
                &upload_id,
                &[
                    CompletePart { part_number: 1, etag: etag1.clone() },
                    CompletePart { part_number: 2, etag: etag2.clone() },
                ],
            )
            .await
            .unwrap();

        let read = fs.get_object("uploads", "big", 0, None).await.unwrap();
        assert_eq!(read.as_ref(), b"helloworld");

        let expected = s3_multipart_etag(&[etag1, etag2]).unwrap();
        assert_eq!(info.md5.as_deref(), Some(expected.as_str()));
        assert!(expected.ends_with("-2"));
    }

    #[tokio::test]
    async fn test_should_concatenate_in_client_given_order() {
        let (_dir, fs) = store_with_bucket().await;

        let upload_id = fs.new_multipart_upload("uploads", "ordered").await.unwrap();
        let etag1 = put_part(&fs, "ordered", &upload_id, 1, b"AAA").await;
        let etag2 = put_part(&fs, "ordered", &upload_id, 2, b"BBB").await;

        // The client asks for part 2 first.
        fs.complete_multipart_upload(
            "uploads",
            "ordered",
            &upload_id,
            &[
                CompletePart { part_number: 2, etag: etag2 },
                CompletePart { part_number: 1, etag: etag1 },
            ],
        )
        .await
        .unwrap();

        let read = fs.get_object("uploads", "ordered", 0, None).await.unwrap();
        assert_eq!(read.as_ref(), b"BBBAAA");
    }

    #[tokio::test]
    async fn test_should_generate_unique_upload_ids_per_initiation() {
        let (_dir, fs) = store_with_bucket().await;

        let first = fs.new_multipart_upload("uploads", "same").await.unwrap();
        let second = fs.new_multipart_upload("uploads", "same").await.unwrap();
        assert_ne!(first, second);

        // Both are live until completed or aborted.
        let listing = fs
            .list_multipart_uploads("uploads", "", "", "", "", 10)
            .await
            .unwrap();
        assert_eq!(listing.uploads.len(), 2);
    }

    #[tokio::test]
    async fn test_should_publish_into_nested_object_path() {
        let (_dir, fs) = store_with_bucket().await;

        let upload_id = fs
            .new_multipart_upload("uploads", "deep/tree/object.bin")
            .await
            .unwrap();
        let etag = put_part(&fs, "deep/tree/object.bin", &upload_id, 1, b"nested").await;

        fs.complete_multipart_upload(
            "uploads",
            "deep/tree/object.bin",
            &upload_id,
            &[CompletePart { part_number: 1, etag }],
        )
        .await
        .unwrap();

        let read = fs
            .get_object("uploads", "deep/tree/object.bin", 0, None)
            .await
            .unwrap();
        assert_eq!(read.as_ref(), b"nested");
    }

    #[tokio::test]
    async fn test_should_keep_upload_private_until_completed() {
        let (_dir, fs) = store_with_bucket().await;

        let upload_id = fs.new_multipart_upload("uploads", "pending").await.unwrap();
        put_part(&fs, "pending", &upload_id, 1, b"not yet").await;

        // The object is not visible before completion.
        let err = fs.get_object("uploads", "pending", 0, None).await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::ObjectNotFound { .. }));
        let listing = fs.list_objects("uploads", "", "", "", 10).await.unwrap();
        assert!(listing.objects.is_empty());
    }

    #[tokio::test]
    async fn test_should_abort_and_forget_upload() {
        let (_dir, fs) = store_with_bucket().await;

        let upload_id = fs.new_multipart_upload("uploads", "aborted").await.unwrap();
        put_part(&fs, "aborted", &upload_id, 1, b"thrown away").await;

        fs.abort_multipart_upload("uploads", "aborted", &upload_id)
            .await
            .unwrap();

        let listing = fs
            .list_multipart_uploads("uploads", "", "", "", "", 10)
            .await
            .unwrap();
        assert!(listing.uploads.is_empty());

        let data = b"x";
        let err = fs
            .put_object_part(
                "uploads",
                "aborted",
                &upload_id,
                2,
                1,
                &mut &data[..],
                &md5_hex(data),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::InvalidUploadId { .. }));
    }

    #[tokio::test]
    async fn test_should_verify_part_digests() {
        let (_dir, fs) = store_with_bucket().await;
        let upload_id = fs.new_multipart_upload("uploads", "sum").await.unwrap();

        let data = b"checked";
        let err = fs
            .put_object_part(
                "uploads",
                "sum",
                &upload_id,
                1,
                data.len() as i64,
                &mut &data[..],
                "11111111111111111111111111111111",
            )
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BadDigest { .. }));

        // The mismatching part was never stored.
        let listing = fs
            .list_object_parts("uploads", "sum", &upload_id, 0, 10)
            .await
            .unwrap();
        assert!(listing.parts.is_empty());
    }

    #[tokio::test]
    async fn test_should_list_parts_after_upload() {
        let (_dir, fs) = store_with_bucket().await;
        let upload_id = fs.new_multipart_upload("uploads", "listed").await.unwrap();

        let etag2 = put_part(&fs, "listed", &upload_id, 2, b"two").await;
        let etag1 = put_part(&fs, "listed", &upload_id, 1, b"one").await;

        let listing = fs
            .list_object_parts("uploads", "listed", &upload_id, 0, 10)
            .await
            .unwrap();

        assert_eq!(listing.parts.len(), 2);
        assert_eq!(listing.parts[0].part_number, 1);
        assert_eq!(listing.parts[0].etag, etag1);
        assert_eq!(listing.parts[1].part_number, 2);
        assert_eq!(listing.parts[1].etag, etag2);
        assert_eq!(listing.parts[0].size, 3);
    }

    #[tokio::test]
    async fn test_should_filter_multipart_listing_by_prefix() {
        let (_dir, fs) = store_with_bucket().await;
        fs.new_multipart_upload("uploads", "photos/summer").await.unwrap();
        fs.new_multipart_upload("uploads", "docs/report").await.unwrap();

        let listing = fs
            .list_multipart_uploads("uploads", "photos/", "", "", "", 10)
            .await
            .unwrap();
        let objects: Vec<_> = listing.uploads.iter().map(|u| u.object.as_str()).collect();
        assert_eq!(objects, ["photos/summer"]);
    }

    #[tokio::test]
    async fn test_should_reject_marker_outside_prefix_for_uploads() {
        let (_dir, fs) = store_with_bucket().await;
        let err = fs
            .list_multipart_uploads("uploads", "asia", "europe-object", "", "", 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            StorageErrorKind::InvalidMarkerPrefix { .. }
        ));
    }
}
