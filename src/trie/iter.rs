//! Resumable trie traversal.
//!
//! A [`Cursor`] walks every petal of a [`RecurseMap`] by advancing a 64-bit
//! "virtual hash" one nibble at a time: descending with its digits selects a
//! path, a null slot bumps the digit at that level (clearing everything
//! below), and a carry out of the top nibble ends the pass.
//!
//! Entries of the petal sub-slot under the cursor are snapshotted into a
//! pending queue by copying `(key, value)` pairs, so iteration is safe under
//! concurrent `set`/`delete`. With no concurrent writers a full pass yields
//! every live entry exactly once; under writers, entries present for the
//! whole pass are yielded at least once and nothing is yielded twice.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;

use super::map::{nibble, Child, RecurseMap, FANOUT};

/// Iteration state over a [`RecurseMap`].
///
/// A cursor is cheap to create, holds no lock and no reference into the map,
/// and may be kept across calls indefinitely. After a pass completes
/// ([`RecurseMap::next_entry`] returned `None`) the same cursor starts a
/// fresh pass.
pub struct Cursor<V> {
    vhash: u64,
    wrapped: bool,
    pending: VecDeque<(Bytes, Arc<V>)>,
}

impl<V> Default for Cursor<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cursor<V> {
    pub fn new() -> Self {
        Self {
            vhash: 0,
            wrapped: false,
            pending: VecDeque::new(),
        }
    }

    /// Sets the digit at `level`, clearing all digits below it.
    fn set_nibble(&mut self, level: u8, value: usize) {
        let shift = 60 - 4 * u32::from(level);
        let kept = if level == 0 {
            0
        } else {
            self.vhash & (u64::MAX << (shift + 4))
        };
        self.vhash = kept | ((value as u64) << shift);
    }

    /// Steps past the current position at `level`: increments that digit,
    /// clears the digits below, and marks the pass done on carry-out.
    fn advance(&mut self, level: u8) {
        let shift = 60 - 4 * u32::from(level);
        let base = self.vhash & (u64::MAX << shift);
        match base.checked_add(1 << shift) {
            Some(next) => self.vhash = next,
            None => {
                self.vhash = 0;
                self.wrapped = true;
            }
        }
    }
}

impl<V> RecurseMap<V> {
    /// Creates a cursor positioned at the start of a pass.
    pub fn cursor(&self) -> Cursor<V> {
        Cursor::new()
    }

    /// Returns the next entry under `cursor`, or `None` exactly once when a
    /// full pass over the map has completed.
    pub fn next_entry(&self, cursor: &mut Cursor<V>) -> Option<(Bytes, Arc<V>)> {
        if let Some(entry) = cursor.pending.pop_front() {
            return Some(entry);
        }
        while !cursor.wrapped {
            self.fill_pending(cursor);
            if let Some(entry) = cursor.pending.pop_front() {
                return Some(entry);
            }
        }
        // Pass complete; the cursor is reusable for the next pass.
        cursor.wrapped = false;
        None
    }

    /// One descent attempt: snapshots the next non-empty petal sub-slot at or
    /// after the virtual hash into the pending queue, or advances the cursor
    /// past a dead end.
    fn fill_pending(&self, cursor: &mut Cursor<V>) {
        let mut level = 0u8;
        let mut current = match self.root.slots[nibble(cursor.vhash, 0)].load_full() {
            Some(child) => child,
            None => return cursor.advance(0),
        };
        loop {
            let next = match &*current {
                Child::Stem(stem) => {
                    level += 1;
                    match stem.slots[nibble(cursor.vhash, level)].load_full() {
                        Some(child) => child,
                        None => return cursor.advance(level),
                    }
                }
                Child::Petal(petal) => {
                    let sub_level = level + 1;
                    for sub in nibble(cursor.vhash, sub_level)..FANOUT {
                        let mut entry = petal.slots[sub].load_full();
                        if entry.is_none() {
                            continue;
                        }
                        while let Some(node) = entry {
                            cursor
                                .pending
                                .push_back((node.key.clone(), node.value.load_full()));
                            entry = node.next.load_full();
                        }
                        cursor.set_nibble(sub_level, sub);
                        cursor.advance(sub_level);
                        return;
                    }
                    return cursor.advance(level);
                }
            };
            current = next;
        }
    }
}
