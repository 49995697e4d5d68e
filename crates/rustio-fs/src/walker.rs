//! Filtered, ordered directory reads.
//!
//! All listing paths in the engine read directories through these helpers:
//! entries come back sorted byte-wise ascending by name, with directory
//! names carrying a trailing `/` so files and directories interleave in the
//! same order their object names would. Nothing here filters hidden
//! entries; callers impose their own policy.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

/// Metadata for one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name; directories end with `/`.
    pub name: String,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Read `dir` non-recursively, returning entries matching `predicate` in
/// byte-wise ascending name order. Directories are skipped entirely when
/// `include_dirs` is false.
///
/// Entries with non-UTF-8 names are skipped: the engine only ever creates
/// UTF-8 names, so anything else is foreign to the store.
pub async fn filtered_readdir<F>(
    dir: &Path,
    predicate: F,
    include_dirs: bool,
) -> io::Result<Vec<DirEntry>>
where
    F: Fn(&DirEntry) -> bool,
{
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let Some(raw_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let meta = entry.metadata().await?;
        let is_dir = meta.is_dir();
        if is_dir && !include_dirs {
            continue;
        }

        let name = if is_dir { format!("{raw_name}/") } else { raw_name };
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();
        let candidate = DirEntry {
            name,
            modified,
            size: if is_dir { 0 } else { meta.len() },
            is_dir,
        };
        if predicate(&candidate) {
            entries.push(candidate);
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read `dir` non-recursively, returning just the names matching
/// `predicate`, sorted byte-wise ascending. Names are raw: no trailing `/`
/// marker for directories.
pub async fn filtered_readdirnames<F>(dir: &Path, predicate: F) -> io::Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if predicate(&name) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Whether `dir` exists and contains no entries.
pub async fn is_dir_empty(dir: &Path) -> io::Result<bool> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    Ok(read_dir.next_entry().await?.is_none())
}

/// Whether `path` exists and is a directory.
pub async fn is_dir_exist(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` exists and is a regular file. Symlinks are not followed.
pub async fn is_file_exist(path: &Path) -> io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove `path`, then remove its now-empty parent directories strictly
/// below `stop`. Stops at the first non-empty parent.
pub async fn remove_file_and_prune(path: &Path, stop: &Path) -> io::Result<()> {
    tokio::fs::remove_file(path).await?;
    if let Some(parent) = path.parent() {
        prune_empty_dirs(parent, stop).await?;
    }
    Ok(())
}

/// Remove `dir` and its parents while they are empty, stopping (exclusive)
/// at `stop`. Directories outside `stop` are never touched.
pub async fn prune_empty_dirs(dir: &Path, stop: &Path) -> io::Result<()> {
    let mut current = Some(dir);
    while let Some(d) = current {
        if d == stop || !d.starts_with(stop) {
            break;
        }
        match is_dir_empty(d).await {
            Ok(true) => tokio::fs::remove_dir(d).await?,
            Ok(false) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e),
        }
        current = d.parent();
    }
    Ok(())
}
