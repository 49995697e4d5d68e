//! Bucket access policies: document model, evaluation, persistence.
//!
//! Evaluation is **first-match-wins** in statement order: the first
//! statement whose action, resource, and conditions all match decides the
//! outcome, whether it allows or denies, and no statement matching means
//! deny. This diverges from AWS IAM's deny-overrides combination and is
//! intentional; operators porting AWS policies should order deny
//! statements first.
//!
//! Action and resource patterns are regexes matched against the *whole*
//! candidate string (patterns are anchored before compilation), with the
//! resource's leading `/` stripped first.

use std::collections::HashMap;

use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::atomic::AtomicFile;
use crate::error::{StorageError, StorageErrorKind, StorageResult};
use crate::store::Filesystem;
use crate::walker;

/// Maximum accepted policy document size, in bytes.
pub const MAX_BUCKET_POLICY_SIZE: u64 = 20 * 1024 * 1024;

/// File name of the policy document inside a bucket's metadata directory.
const ACCESS_POLICY_FILE: &str = "access-policy.json";

/// A bucket policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketPolicy {
    /// Policy language version tag.
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Statements, evaluated in order.
    #[serde(rename = "Statements", default)]
    pub statements: Vec<PolicyStatement>,
}

/// One policy statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Optional statement identifier.
    #[serde(rename = "Sid", default)]
    pub sid: String,
    /// `"Allow"` or `"Deny"`.
    #[serde(rename = "Effect", default)]
    pub effect: String,
    /// Principal the statement applies to. Carried opaquely; evaluation
    /// does not consult it.
    #[serde(rename = "Principal", default)]
    pub principal: serde_json::Value,
    /// Action patterns (anchored regexes).
    #[serde(rename = "Actions", default)]
    pub actions: Vec<String>,
    /// Resource patterns (anchored regexes).
    #[serde(rename = "Resources", default)]
    pub resources: Vec<String>,
    /// Conditions: operator name to `{condition key: value}`.
    #[serde(rename = "Conditions", default)]
    pub conditions: HashMap<String, HashMap<String, String>>,
}

/// Parse and validate a policy document.
///
/// # Errors
///
/// [`StorageErrorKind::InvalidPolicyDocument`] on malformed JSON, an
/// unknown effect, or a statement without actions or resources.
pub fn parse_bucket_policy(raw: &[u8]) -> StorageResult<BucketPolicy> {
    let policy: BucketPolicy =
        serde_json::from_slice(raw).map_err(|e| invalid_document(format!("parse error: {e}")))?;

    for statement in &policy.statements {
        if statement.effect != "Allow" && statement.effect != "Deny" {
            return Err(invalid_document(format!(
                "unknown effect {:?} in statement {:?}",
                statement.effect, statement.sid
            )));
        }
        if statement.actions.is_empty() {
            return Err(invalid_document(format!(
                "statement {:?} has no actions",
                statement.sid
            )));
        }
        if statement.resources.is_empty() {
            return Err(invalid_document(format!(
                "statement {:?} has no resources",
                statement.sid
            )));
        }
    }

    Ok(policy)
}

/// Decide whether `action` on `resource` under `conditions` is allowed by
/// `statements`.
///
/// The first matching statement wins; no match denies.
///
/// # Errors
///
/// [`StorageErrorKind::InvalidPolicyDocument`] when a statement carries an
/// invalid regex — a stored-configuration error, surfaced here because
/// this is where the pattern is first compiled against a request.
pub fn evaluate_statements(
    action: &str,
    resource: &str,
    conditions: &HashMap<String, String>,
    statements: &[PolicyStatement],
) -> StorageResult<bool> {
    for statement in statements {
        if statement_matches(action, resource, conditions, statement)? {
            return Ok(statement.effect == "Allow");
        }
    }
    Ok(false)
}

fn statement_matches(
    action: &str,
    resource: &str,
    conditions: &HashMap<String, String>,
    statement: &PolicyStatement,
) -> StorageResult<bool> {
    Ok(action_matches(action, statement)?
        && resource_matches(resource, statement)?
        && conditions_match(conditions, statement))
}

fn action_matches(action: &str, statement: &PolicyStatement) -> StorageResult<bool> {
    for pattern in &statement.actions {
        if full_match(pattern, action)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn resource_matches(resource: &str, statement: &PolicyStatement) -> StorageResult<bool> {
    let resource = resource.strip_prefix('/').unwrap_or(resource);
    for pattern in &statement.resources {
        if full_match(pattern, resource)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Supported operators: `StringEquals` requires every listed key to equal
/// the request value (missing request values compare as empty),
/// `StringNotEquals` requires every listed key to differ. Unknown
/// operators are ignored.
fn conditions_match(
    request: &HashMap<String, String>,
    statement: &PolicyStatement,
) -> bool {
    for (operator, keys) in &statement.conditions {
        match operator.as_str() {
            "StringEquals" => {
                for (key, value) in keys {
                    if request_value(request, key) != value {
                        return false;
                    }
                }
            }
            "StringNotEquals" => {
                for (key, value) in keys {
                    if request_value(request, key) == value {
                        return false;
                    }
                }
            }
            _ => {}
        }
    }
    true
}

/// Map a condition key (`s3:prefix`, `s3:max-keys`) onto the request's
/// bare key (`prefix`, `max-keys`).
fn request_value<'a>(request: &'a HashMap<String, String>, key: &str) -> &'a str {
    let bare = key.strip_prefix("s3:").unwrap_or(key);
    request.get(bare).map_or("", String::as_str)
}

/// Whole-string regex match.
fn full_match(pattern: &str, candidate: &str) -> StorageResult<bool> {
    let anchored = format!("^(?:{pattern})$");
    let regex = Regex::new(&anchored)
        .map_err(|e| invalid_document(format!("invalid pattern {pattern:?}: {e}")))?;
    Ok(regex.is_match(candidate))
}

fn invalid_document(reason: String) -> StorageError {
    StorageErrorKind::InvalidPolicyDocument { reason }.into()
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Filesystem {
    /// Store a bucket's policy document, replacing any previous one.
    ///
    /// The size cap is enforced before the document is parsed; the
    /// document must parse and validate before it is written.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::EntityTooLarge`] or
    /// [`StorageErrorKind::InvalidPolicyDocument`].
    pub async fn write_bucket_policy(&self, bucket: &str, raw: &[u8]) -> StorageResult<()> {
        let bucket = self.check_bucket(bucket).await?;

        if raw.len() as u64 > MAX_BUCKET_POLICY_SIZE {
            return Err(StorageErrorKind::EntityTooLarge {
                size: raw.len() as u64,
                max: MAX_BUCKET_POLICY_SIZE,
            }
            .into());
        }
        parse_bucket_policy(raw).map_err(|e| e.trace("validating policy before save"))?;

        let meta_bucket = self.meta_bucket_path(&bucket);
        tokio::fs::create_dir_all(&meta_bucket).await?;

        let mut file = AtomicFile::create(meta_bucket.join(ACCESS_POLICY_FILE)).await?;
        file.write_all(raw).await?;
        file.commit().await?;

        debug!(bucket = %bucket, size = raw.len(), "stored bucket policy");
        Ok(())
    }

    /// Read a bucket's policy document.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BucketPolicyNotFound`] when none is stored.
    pub async fn read_bucket_policy(&self, bucket: &str) -> StorageResult<Bytes> {
        let bucket = self.check_bucket(bucket).await?;
        let path = self.meta_bucket_path(&bucket).join(ACCESS_POLICY_FILE);

        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Bytes::from(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageErrorKind::BucketPolicyNotFound { bucket }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a bucket's policy document, pruning the metadata directory
    /// if the policy was the last thing in it.
    ///
    /// # Errors
    ///
    /// [`StorageErrorKind::BucketPolicyNotFound`] when none is stored.
    pub async fn remove_bucket_policy(&self, bucket: &str) -> StorageResult<()> {
        let bucket = self.check_bucket(bucket).await?;
        let meta_bucket = self.meta_bucket_path(&bucket);
        let path = meta_bucket.join(ACCESS_POLICY_FILE);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageErrorKind::BucketPolicyNotFound { bucket }.into());
            }
            Err(e) => return Err(e.into()),
        }

        walker::prune_empty_dirs(&meta_bucket, &self.root().join(crate::store::META_DIR)).await?;
        debug!(bucket = %bucket, "removed bucket policy");
        Ok(())
    }
}
