//! Per-Connection Protocol Loop
//!
//! One handler per client. The handler peeks at the first byte of every
//! request without consuming it and hands the stream to the matching codec:
//! bytes below `0x80` start an ASCII command line, `0x80` starts a binary
//! header, anything else is not a protocol we speak.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │  peek byte → pick codec      │
//!    │  codec reads one command     │
//!    │  store executes it           │
//!    │  codec writes the response   │
//!    │  flush, loop                 │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / quit / protocol error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```

use crate::protocol::types::REQUEST_MAGIC;
use crate::protocol::{ascii, binary, Outcome, ProtocolError};
use crate::store::SharedStore;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Read buffer per connection (64 KiB): a full-size command line or binary
/// body usually arrives in one buffered read.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Write buffer per connection (4 KiB); flushed after every command.
const WRITE_BUFFER_SIZE: usize = 4 * 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client violated the protocol; it has been told already
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// First request byte belongs to no protocol we support
    #[error("unsupported protocol magic {0:#04x}")]
    UnsupportedProtocol(u8),
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The shared store (shared across connections)
    store: Arc<SharedStore>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler, wrapping the socket in the
    /// per-connection buffers.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        store: Arc<SharedStore>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, read_half),
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, write_half),
            addr,
            store,
            stats,
        }
    }

    /// Runs the command loop until the client disconnects, quits, or
    /// violates the protocol.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Protocol(msg)) => {
                debug!(client = %self.addr, error = %msg, "Closing after protocol violation")
            }
            Err(ConnectionError::UnsupportedProtocol(byte)) => {
                warn!(client = %self.addr, magic = byte, "Unsupported protocol")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The peek-dispatch-flush loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Peek one byte without consuming it; the chosen codec re-reads
            // the request from the start.
            let first = {
                let buffered = self.reader.fill_buf().await?;
                if buffered.is_empty() {
                    return Ok(()); // clean EOF between commands
                }
                buffered[0]
            };

            let outcome = if first < REQUEST_MAGIC {
                ascii::command(&mut self.reader, &mut self.writer, &self.store).await
            } else if first == REQUEST_MAGIC {
                binary::command(&mut self.reader, &mut self.writer, &self.store).await
            } else {
                return Err(ConnectionError::UnsupportedProtocol(first));
            };

            self.stats.command_processed();

            match outcome {
                Ok(Outcome::Continue) => self.writer.flush().await?,
                Ok(Outcome::Close) => {
                    self.writer.flush().await?;
                    return Ok(());
                }
                Err(ProtocolError::Client(msg)) => {
                    // The error line is already in the buffer; deliver it
                    // before closing.
                    self.writer.flush().await?;
                    return Err(ConnectionError::Protocol(msg));
                }
                Err(ProtocolError::Io(e)) => return Err(ConnectionError::Io(e)),
            }
        }
    }
}

/// Handles a client connection to completion.
///
/// This is a convenience function that creates a [`ConnectionHandler`] and
/// runs it, logging the outcome instead of returning it.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    store: Arc<SharedStore>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, store, stats);
    // run() already classified and logged the outcome.
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<SharedStore>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(SharedStore::new());
        let stats = Arc::new(ConnectionStats::new());

        let store_clone = Arc::clone(&store);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let store = Arc::clone(&store_clone);
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, store, stats));
            }
        });

        (addr, store, stats)
    }

    async fn read_n(client: &mut TcpStream, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        client.read_exact(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_ascii_set_get() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"set foo 0 0 3\r\nbar\r\n").await.unwrap();
        assert_eq!(read_n(&mut client, 8).await, b"STORED\r\n");

        client.write_all(b"get foo\r\n").await.unwrap();
        assert_eq!(
            read_n(&mut client, 25).await,
            b"VALUE foo 0 3\r\nbar\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn test_ascii_pipelined_commands() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set a 0 0 1\r\n1\r\nset b 0 0 1\r\n2\r\nget a b\r\n")
            .await
            .unwrap();

        let expected: &[u8] = b"STORED\r\nSTORED\r\nVALUE a 0 1\r\n1\r\nVALUE b 0 1\r\n2\r\nEND\r\n";
        assert_eq!(read_n(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_binary_set_get_roundtrip() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // Set "foo" = "bar": extras flags(4)+exptime(4), totalBody = 14.
        let mut set = vec![0u8; 24];
        set[0] = 0x80;
        set[1] = 0x01;
        set[2..4].copy_from_slice(&3u16.to_be_bytes());
        set[4] = 8;
        set[8..12].copy_from_slice(&14u32.to_be_bytes());
        set[12..16].copy_from_slice(&0x1122_3344u32.to_be_bytes());
        set.extend_from_slice(&[0u8; 8]);
        set.extend_from_slice(b"foo");
        set.extend_from_slice(b"bar");
        client.write_all(&set).await.unwrap();

        let resp = read_n(&mut client, 24).await;
        assert_eq!(resp[0], 0x81);
        assert_eq!(resp[1], 0x01);
        assert_eq!(u16::from_be_bytes([resp[6], resp[7]]), 0x0000);
        assert_eq!(
            u32::from_be_bytes([resp[12], resp[13], resp[14], resp[15]]),
            0x1122_3344
        );
        let cas = u64::from_be_bytes(resp[16..24].try_into().unwrap());
        assert_ne!(cas, 0);

        // Get "foo".
        let mut get = vec![0u8; 24];
        get[0] = 0x80;
        get[1] = 0x00;
        get[2..4].copy_from_slice(&3u16.to_be_bytes());
        get[8..12].copy_from_slice(&3u32.to_be_bytes());
        get.extend_from_slice(b"foo");
        client.write_all(&get).await.unwrap();

        let resp = read_n(&mut client, 24 + 7).await;
        assert_eq!(u16::from_be_bytes([resp[6], resp[7]]), 0x0000);
        assert_eq!(resp[4], 4); // extras length
        assert_eq!(
            u32::from_be_bytes([resp[8], resp[9], resp[10], resp[11]]),
            7
        );
        assert_eq!(&resp[24..28], &[0, 0, 0, 0]); // flags
        assert_eq!(&resp[28..], b"bar"); // value
    }

    #[tokio::test]
    async fn test_both_protocols_on_one_connection() {
        let (addr, store, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // ASCII set...
        client.write_all(b"set k 0 0 2\r\nhi\r\n").await.unwrap();
        assert_eq!(read_n(&mut client, 8).await, b"STORED\r\n");

        // ...then a binary get on the same socket.
        let mut get = vec![0u8; 24];
        get[0] = 0x80;
        get[2..4].copy_from_slice(&1u16.to_be_bytes());
        get[8..12].copy_from_slice(&1u32.to_be_bytes());
        get.extend_from_slice(b"k");
        client.write_all(&get).await.unwrap();

        let resp = read_n(&mut client, 24 + 6).await;
        assert_eq!(u16::from_be_bytes([resp[6], resp[7]]), 0x0000);
        assert_eq!(&resp[28..], b"hi");

        assert_eq!(store.get(b"k").unwrap().value, Bytes::from("hi"));
    }

    #[tokio::test]
    async fn test_unsupported_magic_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(&[0x90, 0x00, 0x00]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "server should close without replying");
    }

    #[tokio::test]
    async fn test_quit_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"quit\r\n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_client_error_closes_connection() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"set k 0 0 nope\r\n").await.unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.starts_with(b"CLIENT_ERROR"));
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"version\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
