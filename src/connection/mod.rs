//! Connection Handling
//!
//! This module manages individual client connections. Each accepted socket
//! is handled by its own async task that owns a buffered reader and writer
//! and loops over complete commands.
//!
//! ## Protocol Detection
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │   peek first byte (not consumed)                            │
//! │        │                                                    │
//! │        ├── < 0x80 ──► ASCII parser (re-reads the line)      │
//! │        ├── = 0x80 ──► binary codec (reads the full header)  │
//! │        └── > 0x80 ──► log and close                         │
//! │                                                             │
//! │   flush writer after every command                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Within one connection commands run strictly in order: a command's full
//! response is written (and flushed) before the next request byte is
//! examined. EOF between commands ends the connection cleanly.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
