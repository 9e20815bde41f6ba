//! # TrieKV - A Memcached-Compatible In-Memory Cache Server
//!
//! TrieKV is an in-memory key-value cache written in Rust that speaks both
//! the memcached text and binary protocols over TCP. It demonstrates systems
//! programming concepts like lock-free data structures, network programming,
//! and byte-level protocol framing.
//!
//! ## Features
//!
//! - **Memcached-Compatible**: interoperates with upstream memcached clients
//!   over both the ASCII and the binary wire protocol
//! - **Lock-Free Reads**: keys live in a 16-way concurrent hash trie whose
//!   readers never take a lock
//! - **LRU Eviction**: a memory budget is enforced by sampled least-recently
//!   used eviction, inline and from a background crawler
//! - **Async I/O**: built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              TrieKV                                 │
//! │                                                                     │
//! │  ┌─────────────┐    ┌──────────────┐    ┌──────────────────────┐    │
//! │  │ TCP Server  │───>│ Connection   │───>│ ASCII / binary codec │    │
//! │  │ (Listener)  │    │  Handler     │    │  (per first byte)    │    │
//! │  └─────────────┘    └──────────────┘    └──────────┬───────────┘    │
//! │                                                    │                │
//! │                                                    ▼                │
//! │                     ┌──────────────────────────────────────────┐    │
//! │                     │               SharedStore                │    │
//! │                     │   CAS · size/count · TTL · flush · LRU   │    │
//! │                     │                    │                     │    │
//! │                     │                    ▼                     │    │
//! │                     │          RecurseMap (hash trie)          │    │
//! │                     └──────────────────────────────────────────┘    │
//! │                                         ▲                           │
//! │                                         │                           │
//! │                     ┌───────────────────┴───────────────────┐       │
//! │                     │                Crawler                │       │
//! │                     │        (background Tokio task)        │       │
//! │                     └───────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use triekv::connection::{handle_connection, ConnectionStats};
//! use triekv::store::{start_crawler, SharedStore};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Create the store with a 512 MiB budget and 1 MiB item limit
//!     let store = Arc::new(SharedStore::with_limits(512 << 20, 1 << 20));
//!
//!     // Start the background crawler
//!     let _crawler = start_crawler(Arc::clone(&store));
//!
//!     // Connection statistics
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     // Accept loop
//!     let listener = TcpListener::bind("127.0.0.1:11211").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let store = Arc::clone(&store);
//!         let stats = Arc::clone(&stats);
//!         tokio::spawn(handle_connection(stream, addr, store, stats));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`trie`]: the concurrent hash-trie map (the "recurse map")
//! - [`store`]: cache semantics — CAS, TTL, flush barrier, LRU eviction
//! - [`protocol`]: the memcached ASCII and binary codecs
//! - [`connection`]: per-client connection management and dispatch
//!
//! ## Design Highlights
//!
//! ### Reader Concurrency
//!
//! Every pointer a reader follows — trie children, collision-list links,
//! value cells — is an `arc_swap` slot. A `get` is a handful of atomic
//! loads; writers serialise on small per-node mutexes and publish structural
//! changes (like petal splits) with a single pointer swap.
//!
//! ### Flush Without Deleting
//!
//! `flush_all` only records a barrier timestamp. Records written before it
//! are invisible to readers and are reclaimed lazily by the background
//! crawler, so the command returns in constant time no matter how big the
//! cache is.
//!
//! ### One Socket, Two Protocols
//!
//! The protocol is chosen per command from the first request byte, so a
//! single connection may freely mix ASCII and binary commands, exactly like
//! memcached.

pub mod connection;
pub mod protocol;
pub mod store;
pub mod trie;

// Re-export commonly used types for convenience
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Outcome, ProtocolError};
pub use store::{start_crawler, Crawler, CrawlerConfig, Record, SharedStore, StoreError};
pub use trie::RecurseMap;

/// The default port TrieKV listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default host TrieKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TrieKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
