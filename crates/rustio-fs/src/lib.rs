//! Filesystem-backed object store engine with S3 semantics.
//!
//! This crate turns a directory tree into an S3-semantics-preserving
//! object store: crash-safe object writes, multipart uploads, paginated
//! listing with resumable cursors, bucket access policies, and a typed
//! error taxonomy. It is the storage engine only — HTTP routing, request
//! signing, and XML marshalling belong to the embedding server.
//!
//! # Architecture
//!
//! ```text
//! HTTP layer (routing, auth, XML)          <- not this crate
//!        |
//!        v
//! Filesystem (engine handle)
//!    |-- ops::bucket      bucket CRUD
//!    |-- ops::object      put/get/stat/delete through the safe writer
//!    |-- ops::list        paginated listing over parked scan cursors
//!    |-- ops::multipart   upload-ID lifecycle, part files, completion
//!    |-- policy           first-match policy evaluation + persistence
//!    |
//!    |-- atomic           temp file -> fsync -> rename publish
//!    |-- walker           ordered, filtered readdir
//!    '-- cursor           parked scan state with TTL expiry
//! ```
//!
//! Every operation takes `&self` and may run concurrently; filesystem
//! renames are the only serialization points.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> rustio_fs::StorageResult<()> {
//! let store = rustio_fs::Filesystem::new("/var/lib/rustio").await?;
//! store.make_bucket("photos").await?;
//!
//! let data = b"pixel data";
//! store
//!     .put_object("photos", "cat.png", data.len() as i64, &mut &data[..], None)
//!     .await?;
//!
//! let page = store.list_objects("photos", "", "", "/", 100).await?;
//! assert_eq!(page.objects.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod checksums;
mod cursor;
pub mod disk;
pub mod error;
mod ops;
pub mod policy;
mod store;
pub mod types;
pub mod validation;
pub mod walker;

pub use error::{StorageError, StorageErrorKind, StorageResult};
pub use store::{Filesystem, LIST_OBJECTS_LIMIT};
