//! Parked listing cursors.
//!
//! A paginated listing call walks the directory tree lazily on a producer
//! task and reads one page off a bounded channel. When a page is truncated,
//! the remaining producer state — the receiver plus a one-entry lookahead —
//! is parked here keyed by the listing parameters, so the next page resumes
//! the walk in O(page) instead of rescanning from the start.
//!
//! Several clients may paginate the same parameters concurrently, so each
//! key holds a list of cursors: lookup removes and returns the first
//! unexpired one, and a save pushes it back after use. Expired cursors are
//! dropped whenever their key is touched; dropping a cursor closes its
//! channel, which ends the producer task at its next send.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;

/// How long a parked cursor survives after its last read.
///
/// Expiry counts from the last read, not from creation: a slow client that
/// keeps paginating keeps its cursor alive.
pub(crate) const CURSOR_TTL: Duration = Duration::from_secs(15);

/// Identity of a pagination stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CursorKey {
    pub bucket: String,
    pub delimiter: String,
    pub marker: String,
    pub prefix: String,
    pub upload_id_marker: String,
}

/// A live listing cursor: the producer's channel plus one entry of
/// lookahead used to answer "is there more?" without losing the entry.
#[derive(Debug)]
pub(crate) struct Cursor<T> {
    rx: mpsc::Receiver<T>,
    lookahead: Option<T>,
    last_read: Instant,
}

impl<T> Cursor<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx,
            lookahead: None,
            last_read: Instant::now(),
        }
    }

    /// Next entry, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<T> {
        self.last_read = Instant::now();
        if let Some(item) = self.lookahead.take() {
            return Some(item);
        }
        self.rx.recv().await
    }

    /// Peek at the next entry without consuming it.
    pub async fn peek(&mut self) -> Option<&T> {
        self.last_read = Instant::now();
        if self.lookahead.is_none() {
            self.lookahead = self.rx.recv().await;
        }
        self.lookahead.as_ref()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_read.elapsed() >= ttl
    }
}

/// Pool of parked cursors, keyed by listing parameters.
#[derive(Debug)]
pub(crate) struct CursorPool<T> {
    cursors: DashMap<CursorKey, Vec<Cursor<T>>>,
    ttl: Duration,
}

impl<T: Send + 'static> CursorPool<T> {
    pub fn new() -> Self {
        Self::with_ttl(CURSOR_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cursors: DashMap::new(),
            ttl,
        }
    }

    /// Remove and return the first unexpired cursor for `key`, dropping any
    /// expired ones encountered. The whole entry is taken out of the map
    /// first so the shard lock is never held while callers do I/O on the
    /// returned cursor.
    pub fn take(&self, key: &CursorKey) -> Option<Cursor<T>> {
        let (_, parked) = self.cursors.remove(key)?;

        let mut found = None;
        let mut rest = Vec::new();
        for cursor in parked {
            if cursor.is_expired(self.ttl) {
                continue;
            }
            if found.is_none() {
                found = Some(cursor);
            } else {
                rest.push(cursor);
            }
        }

        if !rest.is_empty() {
            self.cursors.entry(key.clone()).or_default().extend(rest);
        }
        found
    }

    /// Park a cursor for later pickup under `key`.
    pub fn park(&self, key: CursorKey, cursor: Cursor<T>) {
        self.cursors.entry(key).or_default().push(cursor);
    }

    #[cfg(test)]
    pub fn parked_len(&self, key: &CursorKey) -> usize {
        self.cursors.get(key).map_or(0, |v| v.len())
    }
}
