//! Shared Cache Store
//!
//! This module layers memcached cache semantics over the hash trie:
//! CAS tokens, size/count accounting, TTL handling, flush barriers and
//! memory-limit enforcement via sampled LRU eviction.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SharedStore                           │
//! │                                                             │
//! │   counters: count / size / cas_source / flush_at / now      │
//! │   limits:   mem_limit / item_size_limit                     │
//! │                            │                                │
//! │                            ▼                                │
//! │                   RecurseMap<Record>                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │
//!               ┌──────────────┴──────────────┐
//!               │           Crawler           │
//!               │   (background Tokio task)   │
//!               └─────────────────────────────┘
//! ```
//!
//! ## Visibility Rules
//!
//! A record is returned by [`SharedStore::get`] only if it was written after
//! the latest flush barrier and has not passed its expiry time. Hidden
//! records are not deleted eagerly; reclamation belongs to the [`Crawler`]
//! and to LRU eviction.
//!
//! ## Example
//!
//! ```
//! use triekv::store::{Record, SharedStore};
//! use bytes::Bytes;
//!
//! let store = SharedStore::new();
//! store
//!     .set(Record::new(Bytes::from("name"), 0, 0, Bytes::from("Ariz")))
//!     .unwrap();
//!
//! let record = store.get(b"name").unwrap();
//! assert_eq!(record.value, Bytes::from("Ariz"));
//! assert!(record.cas > 0);
//! ```

pub mod crawler;
pub mod shared;

// Re-export commonly used types
pub use crawler::{start_crawler, Crawler, CrawlerConfig};
pub use shared::{Record, SharedStore, StoreError};
