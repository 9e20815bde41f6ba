//! Concurrent Hash-Trie Map
//!
//! This module implements the storage substrate for TrieKV: a 16-way hash
//! trie ("recurse map") with lock-free readers and serialized writers.
//!
//! ## Design Decisions
//!
//! 1. **Nibble descent**: keys are hashed once with XxHash64; each trie level
//!    consumes 4 bits of the 64-bit digest, most significant nibble first.
//! 2. **Lock-free reads**: every child pointer and value cell is an
//!    `arc_swap` slot, so `get` never blocks and never spins.
//! 3. **Serialized writes**: `set`/`delete` take a small per-node mutex while
//!    touching a node's slots; structural changes are published atomically.
//! 4. **Amortised growth**: an oversized petal (terminal node) is rebuilt one
//!    level deeper and swapped in as a whole, so readers observe either the
//!    old petal or the finished subtree, never a half-built one.
//!
//! ## Shape
//!
//! ```text
//!                 ┌───────────┐
//!                 │   Stem    │  16 child slots, one per hash nibble
//!                 └─────┬─────┘
//!           ┌───────────┼────────────┐
//!           ▼           ▼            ▼
//!      ┌────────┐  ┌────────┐   ┌────────┐
//!      │  Stem  │  │ Petal  │   │ (null) │
//!      └───┬────┘  └────────┘   └────────┘
//!          ▼        16 sub-slots, each a linked
//!        ...        list of (key, value) entries
//! ```
//!
//! ## Example
//!
//! ```
//! use triekv::trie::RecurseMap;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let map: RecurseMap<String> = RecurseMap::new();
//! map.set(Bytes::from("answer"), Arc::new("42".to_string()));
//! assert_eq!(map.get(b"answer").as_deref(), Some(&"42".to_string()));
//! ```

pub mod iter;
pub mod map;

// Re-export commonly used types
pub use iter::Cursor;
pub use map::RecurseMap;
