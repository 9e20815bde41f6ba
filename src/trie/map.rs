//! The Recurse Map
//!
//! A concurrent string → value map shaped as a 16-way hash trie. Readers walk
//! the trie with atomic pointer loads only; writers serialise on a per-node
//! mutex acquired hand-over-hand during descent.
//!
//! ## Node Variants
//!
//! - **Stem**: interior node with 16 child slots indexed by one nibble of the
//!   key hash. The root is a stem indexed by nibble 0.
//! - **Petal**: terminal node with 16 sub-slots indexed by the next nibble;
//!   each sub-slot owns a singly-linked list of entries for keys whose hash
//!   collides down to that nibble.
//!
//! Growth only pushes petals deeper: when a petal accumulates more than
//! `PETAL_SPLIT_LIMIT` entries it is reinserted into a fresh stem one level
//! down and the parent slot is swapped to the new subtree. Petals never turn
//! back into stems and empty petals are not reclaimed.
//!
//! ## Concurrency Model
//!
//! ```text
//!   readers (get)      writers (set / delete)
//!        │                      │
//!   atomic loads          per-node Mutex
//!        │                      │
//!        └──────► arc_swap slots ◄──────┘
//! ```
//!
//! A reader that races a split sees either the complete old petal or the
//! complete new subtree. A reader that races a value update sees either the
//! old or the new value Arc, never a torn record.

use arc_swap::{ArcSwap, ArcSwapOption};
use bytes::Bytes;
use parking_lot::Mutex;
use std::hash::Hasher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use twox_hash::XxHash64;

/// Fan-out of every trie level: one hex digit of the 64-bit key hash.
pub(crate) const FANOUT: usize = 16;

/// Deepest level the 64-bit hash can discriminate (16 nibbles, 0-indexed).
pub(crate) const MAX_LEVEL: u8 = 15;

/// A petal holding more entries than this is split one level deeper.
/// 16 sub-slots times an average list length of 6.
const PETAL_SPLIT_LIMIT: usize = FANOUT * 6;

/// Hashes a key for trie placement.
#[inline]
pub(crate) fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key);
    hasher.finish()
}

/// Extracts the 4-bit digit selecting the child slot at `level`.
#[inline]
pub(crate) fn nibble(hash: u64, level: u8) -> usize {
    ((hash >> (60 - 4 * u32::from(level))) & 0xF) as usize
}

/// A child pointer: either another branching level or a terminal petal.
pub(crate) enum Child<V> {
    Stem(Stem<V>),
    Petal(Petal<V>),
}

/// Interior branching node.
pub(crate) struct Stem<V> {
    /// Serialises writers touching this node's slots.
    lock: Mutex<()>,
    pub(crate) slots: [ArcSwapOption<Child<V>>; FANOUT],
}

impl<V> Stem<V> {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            slots: std::array::from_fn(|_| ArcSwapOption::empty()),
        }
    }
}

/// Terminal node: 16 collision lists plus a size counter used to decide
/// when to split.
pub(crate) struct Petal<V> {
    len: AtomicUsize,
    pub(crate) slots: [ArcSwapOption<EntryNode<V>>; FANOUT],
}

/// One (key, value) pair in a petal's collision list. The value cell and the
/// next link are both atomically swappable so readers can walk the list while
/// a writer relinks it.
pub(crate) struct EntryNode<V> {
    pub(crate) key: Bytes,
    pub(crate) value: ArcSwap<V>,
    pub(crate) next: ArcSwapOption<EntryNode<V>>,
}

impl<V> Petal<V> {
    fn new() -> Self {
        Self {
            len: AtomicUsize::new(0),
            slots: std::array::from_fn(|_| ArcSwapOption::empty()),
        }
    }

    fn with_entry(sub: usize, key: Bytes, value: Arc<V>) -> Self {
        let petal = Self::new();
        petal.insert_head(sub, key, value);
        petal
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Prepends a fresh entry to a sub-slot's list.
    fn insert_head(&self, sub: usize, key: Bytes, value: Arc<V>) {
        let head = self.slots[sub].load_full();
        let node = Arc::new(EntryNode {
            key,
            value: ArcSwap::new(value),
            next: ArcSwapOption::new(head),
        });
        self.slots[sub].store(Some(node));
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Updates the entry for `key` in place, or inserts a new one.
    ///
    /// # Returns
    ///
    /// `(old_value, true)` when an existing entry was replaced,
    /// `(None, false)` when the key was new.
    fn upsert(&self, sub: usize, key: Bytes, value: Arc<V>) -> (Option<Arc<V>>, bool) {
        let mut cur = self.slots[sub].load_full();
        while let Some(node) = cur {
            if node.key == key {
                return (Some(node.value.swap(value)), true);
            }
            cur = node.next.load_full();
        }
        self.insert_head(sub, key, value);
        (None, false)
    }

    /// Walks a sub-slot's list comparing full keys.
    fn find(&self, sub: usize, key: &[u8]) -> Option<Arc<V>> {
        let mut cur = self.slots[sub].load_full();
        while let Some(node) = cur {
            if node.key.as_ref() == key {
                return Some(node.value.load_full());
            }
            cur = node.next.load_full();
        }
        None
    }

    /// Unlinks the entry for `key`, replacing the list head or the
    /// predecessor's next pointer. Callers hold the owning stem's lock.
    fn remove(&self, sub: usize, key: &[u8]) -> Option<Arc<V>> {
        let head = self.slots[sub].load_full()?;
        if head.key.as_ref() == key {
            self.slots[sub].store(head.next.load_full());
            self.len.fetch_sub(1, Ordering::Relaxed);
            return Some(head.value.load_full());
        }
        let mut prev = head;
        loop {
            let node = prev.next.load_full()?;
            if node.key.as_ref() == key {
                prev.next.store(node.next.load_full());
                self.len.fetch_sub(1, Ordering::Relaxed);
                return Some(node.value.load_full());
            }
            prev = node;
        }
    }
}

/// Rebuilds an oversized petal as a stem one level deeper.
///
/// `level` is the level of the stem that owns the petal's slot. The new stem
/// lives at `level + 1`; its petals are keyed by nibble `level + 2`. The
/// result is published by the caller with a single slot store, so readers
/// never observe a partial split.
fn split_petal<V>(petal: &Petal<V>, level: u8) -> Stem<V> {
    let stem = Stem::new();
    for slot in &petal.slots {
        let mut cur = slot.load_full();
        while let Some(node) = cur {
            let hash = hash_key(&node.key);
            let idx = nibble(hash, level + 1);
            let sub = nibble(hash, level + 2);
            let child = match stem.slots[idx].load_full() {
                Some(child) => child,
                None => {
                    let child = Arc::new(Child::Petal(Petal::new()));
                    stem.slots[idx].store(Some(child.clone()));
                    child
                }
            };
            if let Child::Petal(target) = &*child {
                target.insert_head(sub, node.key.clone(), node.value.load_full());
            }
            cur = node.next.load_full();
        }
    }
    stem
}

/// A concurrent map from byte-string keys to shared values.
///
/// # Thread Safety
///
/// Any number of concurrent readers may call [`get`](Self::get) while writers
/// call [`set`](Self::set) or [`delete`](Self::delete); writers serialise
/// against each other per node. The map is designed to be wrapped in an `Arc`
/// and shared across tasks.
///
/// # Example
///
/// ```
/// use triekv::trie::RecurseMap;
/// use bytes::Bytes;
/// use std::sync::Arc;
///
/// let map: RecurseMap<u64> = RecurseMap::new();
/// let (old, replaced) = map.set(Bytes::from("k"), Arc::new(1));
/// assert!(old.is_none() && !replaced);
///
/// let (old, replaced) = map.set(Bytes::from("k"), Arc::new(2));
/// assert_eq!(old.as_deref(), Some(&1));
/// assert!(replaced);
/// ```
pub struct RecurseMap<V> {
    pub(crate) root: Stem<V>,
}

impl<V> Default for RecurseMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for RecurseMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurseMap").finish_non_exhaustive()
    }
}

impl<V> RecurseMap<V> {
    /// Creates an empty map. The root stem is allocated eagerly; everything
    /// below it grows on demand.
    pub fn new() -> Self {
        Self { root: Stem::new() }
    }

    /// Inserts or updates the value for `key`.
    ///
    /// # Returns
    ///
    /// `(old_value, true)` when an existing entry was replaced,
    /// `(None, false)` when the key was inserted fresh.
    pub fn set(&self, key: Bytes, value: Arc<V>) -> (Option<Arc<V>>, bool) {
        let hash = hash_key(&key);
        Self::set_at(&self.root, 0, hash, key, value)
    }

    fn set_at(
        stem: &Stem<V>,
        level: u8,
        hash: u64,
        key: Bytes,
        value: Arc<V>,
    ) -> (Option<Arc<V>>, bool) {
        let idx = nibble(hash, level);
        let child = {
            let _guard = stem.lock.lock();
            match stem.slots[idx].load_full() {
                None => {
                    // First key for this slot: a one-entry petal.
                    let petal = Petal::with_entry(nibble(hash, level + 1), key, value);
                    stem.slots[idx].store(Some(Arc::new(Child::Petal(petal))));
                    return (None, false);
                }
                Some(child) => {
                    if let Child::Petal(petal) = &*child {
                        let result = petal.upsert(nibble(hash, level + 1), key, value);
                        if petal.len() > PETAL_SPLIT_LIMIT && level + 2 <= MAX_LEVEL {
                            let split = split_petal(petal, level);
                            stem.slots[idx].store(Some(Arc::new(Child::Stem(split))));
                        }
                        return result;
                    }
                    child
                }
            }
            // Lock released here; the child stem is pinned by the Arc.
        };
        match &*child {
            Child::Stem(next) => Self::set_at(next, level + 1, hash, key, value),
            // Stems are never replaced once published, so a child loaded as a
            // stem under the lock is still a stem here.
            Child::Petal(_) => unreachable!("petal seen past the locked descent"),
        }
    }

    /// Looks up `key` without taking any lock.
    pub fn get(&self, key: &[u8]) -> Option<Arc<V>> {
        let hash = hash_key(key);
        let mut level = 0u8;
        let mut current = self.root.slots[nibble(hash, 0)].load_full()?;
        loop {
            let next = match &*current {
                Child::Petal(petal) => return petal.find(nibble(hash, level + 1), key),
                Child::Stem(stem) => {
                    level += 1;
                    stem.slots[nibble(hash, level)].load_full()?
                }
            };
            current = next;
        }
    }

    /// Removes the entry for `key`.
    ///
    /// # Returns
    ///
    /// The value that was stored, or `None` if the key was absent. The petal
    /// the entry lived in is kept even if it becomes empty.
    pub fn delete(&self, key: &[u8]) -> Option<Arc<V>> {
        let hash = hash_key(key);
        Self::delete_at(&self.root, 0, hash, key)
    }

    fn delete_at(stem: &Stem<V>, level: u8, hash: u64, key: &[u8]) -> Option<Arc<V>> {
        let idx = nibble(hash, level);
        let child = {
            let _guard = stem.lock.lock();
            let child = stem.slots[idx].load_full()?;
            if let Child::Petal(petal) = &*child {
                return petal.remove(nibble(hash, level + 1), key);
            }
            child
        };
        match &*child {
            Child::Stem(next) => Self::delete_at(next, level + 1, hash, key),
            Child::Petal(_) => unreachable!("petal seen past the locked descent"),
        }
    }
}

#[cfg(test)]
impl<V> RecurseMap<V> {
    /// Largest petal in the tree, for growth assertions.
    pub(crate) fn max_petal_len(&self) -> usize {
        fn walk<V>(stem: &Stem<V>) -> usize {
            let mut max = 0;
            for slot in &stem.slots {
                if let Some(child) = slot.load_full() {
                    max = max.max(match &*child {
                        Child::Stem(next) => walk(next),
                        Child::Petal(petal) => petal.len(),
                    });
                }
            }
            max
        }
        walk(&self.root)
    }
}
