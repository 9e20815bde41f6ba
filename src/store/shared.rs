//! The shared store: cache semantics over the recurse map.
//!
//! ## Design Decisions
//!
//! 1. **Advisory counters**: `count` and `size` are relaxed atomics. They
//!    steer eviction decisions and do not need to be linearisable with the
//!    map itself.
//! 2. **Flush by barrier**: `flush_all` stores a timestamp instead of
//!    deleting anything; records written before it are simply invisible until
//!    the crawler reclaims them.
//! 3. **Sampled LRU**: eviction samples up to 1,024 entries with the map
//!    cursor and drops the one with the oldest access time. Cheap, resumable,
//!    and good enough for a cache.
//! 4. **Known races**: `cas`-style read-modify-write through the store is
//!    intentionally racy, and an eviction racing a `set` may drop the record
//!    that was just written. Both match the wire protocol's guarantees.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::trace;

use crate::trie::{Cursor, RecurseMap};

/// Accounting overhead charged per stored entry, on top of the value bytes.
/// Covers the key, the record metadata and the trie entry node.
const ENTRY_OVERHEAD: u64 = 44;

/// How many entries an eviction round inspects before picking a victim.
const EVICTION_SAMPLES: usize = 1024;

/// Expiry values below this are seconds-from-now; at or above, absolute
/// unix seconds. The memcached convention.
pub(crate) const MONTH_SECONDS: u32 = 30 * 24 * 3600;

/// Microseconds since the unix epoch.
#[inline]
pub(crate) fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Seconds since the unix epoch.
#[inline]
pub(crate) fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Errors a store operation can report to the protocol layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The value exceeds the configured per-item size limit.
    #[error("object too large for cache")]
    ObjectTooLarge,
}

/// One cache entry.
///
/// `flags` round-trip verbatim between clients (the binary protocol carries
/// them big-endian, the ASCII protocol as a decimal `u32`). `exptime` is
/// stored in absolute unix seconds after admission; `0` never expires.
#[derive(Debug)]
pub struct Record {
    pub key: Bytes,
    pub flags: u32,
    pub exptime: u32,
    /// Byte length of `value`.
    pub size: u32,
    /// Version token assigned by the store on every set, strictly increasing.
    pub cas: u64,
    pub value: Bytes,
    /// Microsecond timestamp of the last write or read, the LRU hint.
    atime: AtomicU64,
}

impl Record {
    /// Creates a record ready to hand to [`SharedStore::set`]. The store
    /// assigns `cas` and `atime` and normalises `exptime` at admission.
    pub fn new(key: Bytes, flags: u32, exptime: u32, value: Bytes) -> Self {
        let size = value.len() as u32;
        Self {
            key,
            flags,
            exptime,
            size,
            cas: 0,
            value,
            atime: AtomicU64::new(0),
        }
    }

    /// Last-access timestamp in unix microseconds.
    #[inline]
    pub fn atime(&self) -> u64 {
        self.atime.load(Ordering::Relaxed)
    }

    #[inline]
    fn touch(&self, micros: u64) {
        self.atime.store(micros, Ordering::Relaxed);
    }
}

/// Converts a wire expiry to absolute unix seconds.
fn normalize_exptime(exptime: u32, now: u64) -> u32 {
    if exptime == 0 || exptime >= MONTH_SECONDS {
        exptime
    } else {
        (now + u64::from(exptime)) as u32
    }
}

/// The shared cache store.
///
/// # Thread Safety
///
/// Designed to sit in an `Arc` shared by every connection task plus the
/// background [`Crawler`](super::Crawler). Reads never block; writes
/// serialise inside the trie.
pub struct SharedStore {
    map: RecurseMap<Record>,

    /// Live records (advisory).
    count: AtomicU64,

    /// Bytes accounted for: value sizes plus `ENTRY_OVERHEAD` each.
    size: AtomicU64,

    /// Monotonic CAS token source.
    cas_source: AtomicU64,

    /// Flush barrier in unix microseconds; records with an older `atime`
    /// are hidden.
    flush_at: AtomicU64,

    /// Cached wall-clock seconds, refreshed by the crawler once a second.
    now_secs: AtomicU64,

    /// Memory budget in bytes; 0 disables eviction.
    mem_limit: AtomicU64,

    /// Per-item value size limit in bytes; 0 disables the check.
    item_size_limit: AtomicU64,

    /// Persistent sampling cursor for LRU eviction.
    lru_cursor: Mutex<Cursor<Record>>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("count", &self.count.load(Ordering::Relaxed))
            .field("size", &self.size.load(Ordering::Relaxed))
            .field("mem_limit", &self.mem_limit.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SharedStore {
    /// Creates a store with no memory or item-size limit.
    pub fn new() -> Self {
        Self::with_limits(0, 0)
    }

    /// Creates a store with the given limits; either may be 0 to disable.
    pub fn with_limits(mem_limit: u64, item_size_limit: u64) -> Self {
        Self {
            map: RecurseMap::new(),
            count: AtomicU64::new(0),
            size: AtomicU64::new(0),
            cas_source: AtomicU64::new(0),
            flush_at: AtomicU64::new(0),
            now_secs: AtomicU64::new(unix_seconds()),
            mem_limit: AtomicU64::new(mem_limit),
            item_size_limit: AtomicU64::new(item_size_limit),
            lru_cursor: Mutex::new(Cursor::new()),
        }
    }

    /// Admits a record, assigning it a fresh CAS token.
    ///
    /// Over-budget stores trigger one synchronous eviction before the
    /// insert; sustained pressure is handled by the crawler.
    ///
    /// # Returns
    ///
    /// The CAS token assigned to the stored record.
    pub fn set(&self, mut record: Record) -> Result<u64, StoreError> {
        let item_limit = self.item_size_limit.load(Ordering::Relaxed);
        if item_limit > 0 && u64::from(record.size) > item_limit {
            return Err(StoreError::ObjectTooLarge);
        }

        record.exptime = normalize_exptime(record.exptime, self.now_seconds());
        record.touch(unix_micros());

        let mem_limit = self.mem_limit.load(Ordering::Relaxed);
        if mem_limit > 0 && self.size.load(Ordering::Relaxed) > mem_limit {
            self.evict_one();
        }

        let cas = self.cas_source.fetch_add(1, Ordering::Relaxed) + 1;
        record.cas = cas;

        let new_size = u64::from(record.size);
        let key = record.key.clone();
        match self.map.set(key, Arc::new(record)) {
            (Some(old), _) => {
                let old_size = u64::from(old.size);
                if new_size >= old_size {
                    self.size.fetch_add(new_size - old_size, Ordering::Relaxed);
                } else {
                    self.size.fetch_sub(old_size - new_size, Ordering::Relaxed);
                }
            }
            (None, _) => {
                self.count.fetch_add(1, Ordering::Relaxed);
                self.size
                    .fetch_add(new_size + ENTRY_OVERHEAD, Ordering::Relaxed);
            }
        }

        Ok(cas)
    }

    /// Looks up a key.
    ///
    /// Returns `None` if the key is absent, hidden behind the flush barrier,
    /// or expired. A hit refreshes the record's access time (best effort).
    pub fn get(&self, key: &[u8]) -> Option<Arc<Record>> {
        let record = self.map.get(key)?;

        if self.flush_at.load(Ordering::Relaxed) > record.atime() {
            return None;
        }
        if record.exptime > 0 && self.now_seconds() > u64::from(record.exptime) {
            return None;
        }

        record.touch(unix_micros());
        Some(record)
    }

    /// Removes a key.
    ///
    /// # Returns
    ///
    /// `true` if a record was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.remove_entry(key)
    }

    /// Installs a new flush barrier at the current time. Nothing is deleted
    /// here; the crawler reclaims hidden records on its next pass.
    pub fn flush(&self) {
        self.flush_at.store(unix_micros(), Ordering::Relaxed);
    }

    pub fn set_memory_limit(&self, bytes: u64) {
        self.mem_limit.store(bytes, Ordering::Relaxed);
    }

    pub fn set_item_size_limit(&self, bytes: u64) {
        self.item_size_limit.store(bytes, Ordering::Relaxed);
    }

    pub fn memory_limit(&self) -> u64 {
        self.mem_limit.load(Ordering::Relaxed)
    }

    /// Number of live records (approximate, relaxed ordering).
    pub fn len(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accounted bytes: value sizes plus per-entry overhead (approximate).
    pub fn bytes_used(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    /// Cached wall-clock seconds used for expiry checks.
    #[inline]
    pub fn now_seconds(&self) -> u64 {
        self.now_secs.load(Ordering::Relaxed)
    }

    /// Re-reads the wall clock. Called once a second by the crawler.
    pub fn refresh_now(&self) -> u64 {
        let now = unix_seconds();
        self.now_secs.store(now, Ordering::Relaxed);
        now
    }

    pub(crate) fn flush_barrier(&self) -> u64 {
        self.flush_at.load(Ordering::Relaxed)
    }

    /// Samples up to [`EVICTION_SAMPLES`] entries and drops the one with the
    /// oldest access time.
    ///
    /// # Returns
    ///
    /// `true` if a record was evicted.
    pub fn evict_one(&self) -> bool {
        let mut victim: Option<(Bytes, u64)> = None;
        {
            let mut cursor = self.lru_cursor.lock();
            for _ in 0..EVICTION_SAMPLES {
                let Some((key, record)) = self.map.next_entry(&mut cursor) else {
                    break;
                };
                let atime = record.atime();
                if victim.as_ref().is_none_or(|(_, best)| atime < *best) {
                    victim = Some((key, atime));
                }
            }
        }

        match victim {
            Some((key, atime)) => {
                trace!(key = %String::from_utf8_lossy(&key), atime, "evicting record");
                self.remove_entry(&key)
            }
            None => false,
        }
    }

    /// Deletes records left behind the flush barrier. Walks at most the
    /// current record count; called by the crawler after a flush.
    ///
    /// # Returns
    ///
    /// The number of records reclaimed.
    pub(crate) fn sweep_flushed(&self) -> u64 {
        let barrier = self.flush_barrier();
        let budget = self.len();
        let mut cursor = self.map.cursor();
        let mut removed = 0u64;

        for _ in 0..budget {
            let Some((key, record)) = self.map.next_entry(&mut cursor) else {
                break;
            };
            if record.atime() < barrier && self.remove_entry(&key) {
                removed += 1;
            }
        }

        removed
    }

    fn remove_entry(&self, key: &[u8]) -> bool {
        match self.map.delete(key) {
            Some(old) => {
                self.count.fetch_sub(1, Ordering::Relaxed);
                self.size
                    .fetch_sub(u64::from(old.size) + ENTRY_OVERHEAD, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}
