//! Crash-safe file writes: temp file, checksum verification, atomic rename.
//!
//! [`AtomicFile`] is a scoped handle over a temp file `<target>-<8hex>`
//! created in (or next to) the target's directory, so the final
//! [`AtomicFile::commit`] rename stays within one filesystem and is atomic.
//! Until `commit` runs, dropping the handle unlinks the temp file — no
//! control-flow exit can leave a partial file at the target path.
//!
//! [`safe_write`] layers the digest contract on top: stream the reader
//! through an MD5 hasher into the temp file, fail with
//! [`StorageErrorKind::BadDigest`] on mismatch, and only then publish.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use digest::Digest;
use md5::Md5;
use rand::Rng;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::checksums;
use crate::error::{StorageErrorKind, StorageResult};

/// Buffer size for streamed copies.
const COPY_BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// AtomicFile
// ---------------------------------------------------------------------------

/// A temp file that becomes `target` only on [`commit`](Self::commit).
///
/// Implements [`AsyncWrite`], so it can be the destination of
/// `tokio::io::copy` or plain `write_all` calls.
#[derive(Debug)]
pub struct AtomicFile {
    file: Option<File>,
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl AtomicFile {
    /// Create a temp file `<target>-<8hex>` in the target's own directory.
    ///
    /// The target's parent directory must already exist.
    pub async fn create(target: impl Into<PathBuf>) -> io::Result<Self> {
        let target = target.into();
        let temp_base = target.clone();
        Self::open(temp_base, target).await
    }

    /// Create a temp file `<temp_base>-<8hex>`, committing to `target`.
    ///
    /// Used when the temp file must live in a different directory than the
    /// target (for multipart completion the temp sits in the upload
    /// metadir). `temp_base`'s directory and `target` must be on the same
    /// filesystem for the commit rename to stay atomic.
    pub async fn create_with_temp_base(
        temp_base: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> io::Result<Self> {
        Self::open(temp_base.into(), target.into()).await
    }

    async fn open(temp_base: PathBuf, target: PathBuf) -> io::Result<Self> {
        loop {
            let temp_path = random_sibling(&temp_base);
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            options.mode(0o644);

            match options.open(&temp_path).await {
                Ok(file) => {
                    trace!(temp = %temp_path.display(), target = %target.display(), "created temp file");
                    return Ok(Self {
                        file: Some(file),
                        temp_path,
                        target,
                        committed: false,
                    });
                }
                // Suffix collision: roll a fresh one.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// The path of the backing temp file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// The path this file will occupy after [`commit`](Self::commit).
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush, fsync, and rename the temp file onto the target path.
    ///
    /// The rename is the linearization point: concurrent readers observe
    /// either the previous target state or the complete new contents.
    pub async fn commit(mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.sync_all().await?;
        }
        // Close before renaming.
        self.file = None;

        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&self.temp_path, &self.target).await?;
        self.committed = true;
        trace!(target = %self.target.display(), "committed temp file");
        Ok(())
    }

    /// Close and unlink the temp file without publishing.
    ///
    /// Dropping the handle has the same effect; this form makes the discard
    /// explicit and surfaces unlink errors.
    pub async fn discard(mut self) -> io::Result<()> {
        self.file = None;
        self.committed = true;
        tokio::fs::remove_file(&self.temp_path).await
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if !self.committed {
            // Best-effort cleanup; the file may already be gone.
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

impl AsyncWrite for AtomicFile {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(io::Error::other("temp file already closed"))),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

/// Build `<base>-<8hex>` with a random suffix.
fn random_sibling(base: &Path) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(format!("-{:08x}", rand::rng().random::<u32>()));
    PathBuf::from(os)
}

// ---------------------------------------------------------------------------
// safe_write
// ---------------------------------------------------------------------------

/// Stream `reader` to `target` with checksum verification and atomic
/// publish. Returns the computed MD5 hex digest and the byte count written.
///
/// When `size >= 0`, exactly `size` bytes are copied and a short stream is
/// an error; when `size < 0`, the stream is copied to EOF. A non-empty
/// `expected_md5` that does not match the computed digest discards the temp
/// file and fails; nothing is ever visible at `target` until the final
/// rename.
///
/// # Errors
///
/// [`StorageErrorKind::BadDigest`] on digest mismatch, or the underlying
/// I/O error.
pub async fn safe_write<R>(
    target: &Path,
    reader: &mut R,
    size: i64,
    expected_md5: &str,
) -> StorageResult<(String, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut out = AtomicFile::create(target).await?;

    // On any early return below the temp file is unlinked by Drop.
    let (md5_hex, written) = copy_hashed(&mut out, reader, size).await?;

    if !expected_md5.is_empty() && !checksums::md5_hex_eq(expected_md5, &md5_hex) {
        return Err(StorageErrorKind::BadDigest {
            expected: expected_md5.to_owned(),
            computed: md5_hex,
        }
        .into());
    }

    out.commit().await?;
    Ok((md5_hex, written))
}

/// Copy `reader` into `out`, teeing through an MD5 hasher.
async fn copy_hashed<R>(
    out: &mut AtomicFile,
    reader: &mut R,
    size: i64,
) -> StorageResult<(String, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Md5::new();
    let mut remaining = u64::try_from(size).ok();
    let mut written = 0u64;
    let mut buf = vec![0u8; COPY_BUF_SIZE];

    loop {
        let want = match remaining {
            Some(0) => break,
            Some(r) => buf.len().min(usize::try_from(r).unwrap_or(buf.len())),
            None => buf.len(),
        };
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            if remaining.is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended {} bytes early", remaining.unwrap_or(0)),
                )
                .into());
            }
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
        written += n as u64;
        if let Some(r) = &mut remaining {
            *r -= n as u64;
        }
    }

    Ok((hex::encode(hasher.finalize()), written))
}
