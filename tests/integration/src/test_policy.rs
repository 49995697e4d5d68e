//! Bucket policy storage and evaluation, end to end.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rustio_fs::policy::{evaluate_statements, parse_bucket_policy};
    use rustio_fs::{Filesystem, StorageErrorKind};

    use crate::helpers::test_store;

    async fn store_with_bucket() -> (tempfile::TempDir, Filesystem) {
        let (dir, fs) = test_store().await;
        fs.make_bucket("shared").await.unwrap();
        (dir, fs)
    }

    fn read_only_policy() -> &'static [u8] {
        br#"{
            "Version": "2012-10-17",
            "Statements": [{
                "Sid": "read-anything",
                "Effect": "Allow",
                "Principal": {"AWS": ["*"]},
                "Actions": ["s3:GetObject"],
                "Resources": ["shared/.*"]
            }]
        }"#
    }

    #[tokio::test]
    async fn test_should_store_and_evaluate_policy() {
        let (_dir, fs) = store_with_bucket().await;
        fs.write_bucket_policy("shared", read_only_policy())
            .await
            .unwrap();

        let raw = fs.read_bucket_policy("shared").await.unwrap();
        let policy = parse_bucket_policy(&raw).unwrap();

        let conditions = HashMap::new();
        assert!(
            evaluate_statements("s3:GetObject", "/shared/a/b", &conditions, &policy.statements)
                .unwrap()
        );
        assert!(
            !evaluate_statements("s3:PutObject", "/shared/a/b", &conditions, &policy.statements)
                .unwrap()
        );
        assert!(
            !evaluate_statements("s3:GetObject", "/private/a", &conditions, &policy.statements)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_should_evaluate_listing_conditions_from_stored_policy() {
        let (_dir, fs) = store_with_bucket().await;
        let raw = br#"{
            "Statements": [{
                "Effect": "Allow",
                "Actions": ["s3:ListBucket"],
                "Resources": ["shared"],
                "Conditions": {"StringEquals": {"s3:prefix": "public/"}}
            }]
        }"#;
        fs.write_bucket_policy("shared", raw).await.unwrap();
        let policy = parse_bucket_policy(&fs.read_bucket_policy("shared").await.unwrap()).unwrap();

        let public = HashMap::from([("prefix".to_owned(), "public/".to_owned())]);
        assert!(
            evaluate_statements("s3:ListBucket", "/shared", &public, &policy.statements).unwrap()
        );

        let private = HashMap::from([("prefix".to_owned(), "private/".to_owned())]);
        assert!(
            !evaluate_statements("s3:ListBucket", "/shared", &private, &policy.statements)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_should_replace_policy_on_rewrite() {
        let (_dir, fs) = store_with_bucket().await;
        fs.write_bucket_policy("shared", read_only_policy())
            .await
            .unwrap();

        let deny_all = br#"{
            "Statements": [{
                "Effect": "Deny",
                "Actions": [".*"],
                "Resources": [".*"]
            }]
        }"#;
        fs.write_bucket_policy("shared", deny_all).await.unwrap();

        let policy = parse_bucket_policy(&fs.read_bucket_policy("shared").await.unwrap()).unwrap();
        assert_eq!(policy.statements.len(), 1);
        assert_eq!(policy.statements[0].effect, "Deny");
    }

    #[tokio::test]
    async fn test_should_fail_policy_operations_on_missing_bucket() {
        let (_dir, fs) = test_store().await;

        let err = fs
            .write_bucket_policy("nonexistent-bucket", read_only_policy())
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BucketNotFound { .. }));

        let err = fs.read_bucket_policy("nonexistent-bucket").await.unwrap_err();
        assert!(matches!(err.kind(), StorageErrorKind::BucketNotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_remove_policy_and_then_miss_it() {
        let (_dir, fs) = store_with_bucket().await;
        fs.write_bucket_policy("shared", read_only_policy())
            .await
            .unwrap();

        fs.remove_bucket_policy("shared").await.unwrap();

        let err = fs.read_bucket_policy("shared").await.unwrap_err();
        assert!(matches!(
            err.kind(),
            StorageErrorKind::BucketPolicyNotFound { .. }
        ));
    }
}
