//! ASCII Protocol Parser
//!
//! The classic line-oriented memcached text protocol. A command is one
//! CRLF-terminated line of space-separated tokens (bare LF is tolerated);
//! storage commands are followed by a data block of exactly `<bytes>` bytes
//! and a trailing CRLF.
//!
//! ## Supported Commands
//!
//! - `set|add|replace <key> <flags> <exptime> <bytes> [noreply]`
//! - `append|prepend <key> <flags> <exptime> <bytes> [noreply]`
//! - `cas <key> <flags> <exptime> <bytes> <cas> [noreply]`
//! - `get <key> [key ...]` / `gets <key> [key ...]`
//! - `delete <key> [noreply]`
//! - `incr|decr <key> <delta> [noreply]`
//! - `flush_all [noreply]`
//! - `version`, `verbosity 0|1 [noreply]`, `stats [items|slabs|sizes]`
//! - `quit`
//!
//! `noreply` suppresses success and condition replies (`STORED`,
//! `NOT_STORED`, `EXISTS`, ...); protocol violations are still reported with
//! `CLIENT_ERROR` and end the connection. Unknown commands answer `ERROR`
//! and keep the connection alive.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{Outcome, ProtocolError};
use crate::store::shared::unix_seconds;
use crate::store::{Record, SharedStore, StoreError};

/// Reads one ASCII command from `reader`, executes it against `store`, and
/// writes the response to `writer`.
///
/// # Returns
///
/// [`Outcome::Close`] for `quit` or EOF mid-line; [`ProtocolError::Client`]
/// when a violation was reported to the client and the connection must end.
pub async fn command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
) -> Result<Outcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(128);
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(Outcome::Close);
    }
    trim_line_ending(&mut line);

    let Ok(text) = std::str::from_utf8(&line) else {
        return client_error(writer, "malformed request line").await;
    };
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some((&name, args)) = tokens.split_first() else {
        return error_reply(writer).await;
    };

    match name {
        "set" | "add" | "replace" => store_command(reader, writer, store, name, args).await,
        "append" | "prepend" => concat_command(reader, writer, store, name, args).await,
        "cas" => cas_command(reader, writer, store, args).await,
        "get" => get_command(writer, store, args, false).await,
        "gets" => get_command(writer, store, args, true).await,
        "delete" => delete_command(writer, store, args).await,
        "incr" | "decr" => incr_decr_command(writer, store, name, args).await,
        "flush_all" => flush_command(writer, store, args).await,
        "version" => {
            writer
                .write_all(format!("VERSION {}\r\n", crate::VERSION).as_bytes())
                .await?;
            Ok(Outcome::Continue)
        }
        "verbosity" => verbosity_command(writer, args).await,
        "stats" => stats_command(writer, args).await,
        "quit" => Ok(Outcome::Close),
        _ => error_reply(writer).await,
    }
}

/// Strips the trailing `\r\n` (or bare `\n`) from a request line.
fn trim_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

async fn error_reply<W>(writer: &mut W) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(b"ERROR\r\n").await?;
    Ok(Outcome::Continue)
}

/// Reports a protocol violation and ends the connection.
async fn client_error<W>(writer: &mut W, msg: &str) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("CLIENT_ERROR {msg}\r\n").as_bytes())
        .await?;
    Err(ProtocolError::Client(msg.to_string()))
}

/// Writes `msg` unless the command carried `noreply`.
async fn reply<W>(writer: &mut W, noreply: bool, msg: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !noreply {
        writer.write_all(msg).await?;
    }
    Ok(())
}

/// Parsed `<key> <flags> <exptime> <bytes> [<cas>] [noreply]` argument list.
struct StorageArgs<'a> {
    key: &'a str,
    flags: u32,
    exptime: u32,
    bytes: usize,
    cas: u64,
    noreply: bool,
}

fn parse_storage_args<'a>(args: &[&'a str], with_cas: bool) -> Result<StorageArgs<'a>, String> {
    let required = if with_cas { 5 } else { 4 };
    let noreply = args.len() == required + 1 && args[required] == "noreply";
    if args.len() != required && !noreply {
        return Err("bad command line format".to_string());
    }

    let flags = args[1]
        .parse::<u32>()
        .map_err(|e| format!("invalid flags argument: {e}"))?;
    let exptime = args[2]
        .parse::<u32>()
        .map_err(|e| format!("invalid exptime argument: {e}"))?;
    let bytes = args[3]
        .parse::<usize>()
        .map_err(|e| format!("invalid bytes argument: {e}"))?;
    let cas = if with_cas {
        args[4]
            .parse::<u64>()
            .map_err(|e| format!("invalid cas argument: {e}"))?
    } else {
        0
    };

    Ok(StorageArgs {
        key: args[0],
        flags,
        exptime,
        bytes,
        cas,
        noreply,
    })
}

/// Reads `<len>` value bytes plus the trailing CRLF (bare LF tolerated).
///
/// # Returns
///
/// `Ok(None)` when the terminator is missing ("bad data chunk").
async fn read_data_block<R>(reader: &mut R, len: usize) -> std::io::Result<Option<Bytes>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    let mut tail = [0u8; 1];
    reader.read_exact(&mut tail).await?;
    if tail[0] == b'\r' {
        reader.read_exact(&mut tail).await?;
    }
    if tail[0] != b'\n' {
        return Ok(None);
    }

    Ok(Some(Bytes::from(buf)))
}

/// `set`, `add` and `replace`.
async fn store_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    name: &str,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let parsed = match parse_storage_args(args, false) {
        Ok(parsed) => parsed,
        Err(msg) => return client_error(writer, &msg).await,
    };
    // The data block is consumed before any condition check so the stream
    // stays framed on NOT_STORED paths.
    let Some(value) = read_data_block(reader, parsed.bytes).await? else {
        return client_error(writer, "bad data chunk").await;
    };

    let exists = store.get(parsed.key.as_bytes()).is_some();
    let storable = match name {
        "add" => !exists,
        "replace" => exists,
        _ => true,
    };
    if !storable {
        reply(writer, parsed.noreply, b"NOT_STORED\r\n").await?;
        return Ok(Outcome::Continue);
    }

    let record = Record::new(
        Bytes::copy_from_slice(parsed.key.as_bytes()),
        parsed.flags,
        parsed.exptime,
        value,
    );
    finish_store(writer, store, record, parsed.noreply).await
}

/// `append` and `prepend`: concatenate onto an existing record, preserving
/// its flags and expiry.
async fn concat_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    name: &str,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let parsed = match parse_storage_args(args, false) {
        Ok(parsed) => parsed,
        Err(msg) => return client_error(writer, &msg).await,
    };
    let Some(value) = read_data_block(reader, parsed.bytes).await? else {
        return client_error(writer, "bad data chunk").await;
    };

    let Some(existing) = store.get(parsed.key.as_bytes()) else {
        reply(writer, parsed.noreply, b"NOT_STORED\r\n").await?;
        return Ok(Outcome::Continue);
    };

    let mut combined = BytesMut::with_capacity(existing.value.len() + value.len());
    if name == "append" {
        combined.extend_from_slice(&existing.value);
        combined.extend_from_slice(&value);
    } else {
        combined.extend_from_slice(&value);
        combined.extend_from_slice(&existing.value);
    }

    let record = Record::new(
        existing.key.clone(),
        existing.flags,
        existing.exptime,
        combined.freeze(),
    );
    finish_store(writer, store, record, parsed.noreply).await
}

/// `cas`: store only if the client saw the current version.
async fn cas_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let parsed = match parse_storage_args(args, true) {
        Ok(parsed) => parsed,
        Err(msg) => return client_error(writer, &msg).await,
    };
    let Some(value) = read_data_block(reader, parsed.bytes).await? else {
        return client_error(writer, "bad data chunk").await;
    };

    // Check-then-store is not atomic; a concurrent set wins the race.
    match store.get(parsed.key.as_bytes()) {
        None => {
            reply(writer, parsed.noreply, b"NOT_FOUND\r\n").await?;
            Ok(Outcome::Continue)
        }
        Some(existing) if existing.cas != parsed.cas => {
            reply(writer, parsed.noreply, b"EXISTS\r\n").await?;
            Ok(Outcome::Continue)
        }
        Some(_) => {
            let record = Record::new(
                Bytes::copy_from_slice(parsed.key.as_bytes()),
                parsed.flags,
                parsed.exptime,
                value,
            );
            finish_store(writer, store, record, parsed.noreply).await
        }
    }
}

async fn finish_store<W>(
    writer: &mut W,
    store: &SharedStore,
    record: Record,
    noreply: bool,
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    match store.set(record) {
        Ok(_) => reply(writer, noreply, b"STORED\r\n").await?,
        Err(StoreError::ObjectTooLarge) => {
            writer
                .write_all(b"SERVER_ERROR object too large for cache\r\n")
                .await?;
        }
    }
    Ok(Outcome::Continue)
}

/// `get` and `gets` (the latter appends the CAS token).
async fn get_command<W>(
    writer: &mut W,
    store: &SharedStore,
    keys: &[&str],
    with_cas: bool,
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if keys.is_empty() {
        return error_reply(writer).await;
    }

    for key in keys {
        if let Some(record) = store.get(key.as_bytes()) {
            let header = if with_cas {
                format!(
                    "VALUE {} {} {} {}\r\n",
                    key, record.flags, record.size, record.cas
                )
            } else {
                format!("VALUE {} {} {}\r\n", key, record.flags, record.size)
            };
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&record.value).await?;
            writer.write_all(b"\r\n").await?;
        }
    }

    writer.write_all(b"END\r\n").await?;
    Ok(Outcome::Continue)
}

async fn delete_command<W>(
    writer: &mut W,
    store: &SharedStore,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let (key, noreply) = match args {
        [key] => (*key, false),
        [key, "noreply"] => (*key, true),
        _ => return error_reply(writer).await,
    };

    // Consult the store first so flushed or expired keys answer NOT_FOUND.
    if store.get(key.as_bytes()).is_none() {
        reply(writer, noreply, b"NOT_FOUND\r\n").await?;
    } else {
        store.delete(key.as_bytes());
        reply(writer, noreply, b"DELETED\r\n").await?;
    }
    Ok(Outcome::Continue)
}

/// `incr` and `decr`: decimal u64 arithmetic, saturating at the ends.
async fn incr_decr_command<W>(
    writer: &mut W,
    store: &SharedStore,
    name: &str,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let (key, delta, noreply) = match args {
        [key, delta] => (*key, *delta, false),
        [key, delta, "noreply"] => (*key, *delta, true),
        _ => return error_reply(writer).await,
    };

    let Ok(delta) = delta.parse::<u64>() else {
        return client_error(writer, "invalid numeric delta argument").await;
    };

    let Some(existing) = store.get(key.as_bytes()) else {
        reply(writer, noreply, b"NOT_FOUND\r\n").await?;
        return Ok(Outcome::Continue);
    };

    let current = std::str::from_utf8(&existing.value)
        .ok()
        .and_then(|s| s.parse::<u64>().ok());
    let Some(current) = current else {
        return client_error(writer, "cannot increment or decrement non-numeric value").await;
    };

    let updated = if name == "incr" {
        current.saturating_add(delta)
    } else {
        current.saturating_sub(delta)
    };

    let record = Record::new(
        existing.key.clone(),
        existing.flags,
        existing.exptime,
        Bytes::from(updated.to_string()),
    );
    if store.set(record).is_err() {
        writer
            .write_all(b"SERVER_ERROR object too large for cache\r\n")
            .await?;
        return Ok(Outcome::Continue);
    }

    reply(writer, noreply, format!("{updated}\r\n").as_bytes()).await?;
    Ok(Outcome::Continue)
}

async fn flush_command<W>(
    writer: &mut W,
    store: &SharedStore,
    args: &[&str],
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let noreply = args.last() == Some(&"noreply");
    if !args.is_empty() && !(args.len() == 1 && noreply) {
        return error_reply(writer).await;
    }

    store.flush();
    reply(writer, noreply, b"OK\r\n").await?;
    Ok(Outcome::Continue)
}

async fn verbosity_command<W>(writer: &mut W, args: &[&str]) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let noreply = args.last() == Some(&"noreply");
    match args.first() {
        Some(&"0") | Some(&"1") => {
            reply(writer, noreply, b"OK\r\n").await?;
            Ok(Outcome::Continue)
        }
        _ => error_reply(writer).await,
    }
}

async fn stats_command<W>(writer: &mut W, args: &[&str]) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    match args.first() {
        None => {
            let stats = format!(
                "STAT pid {}\r\nSTAT time {}\r\nSTAT version {}\r\nEND\r\n",
                std::process::id(),
                unix_seconds(),
                crate::VERSION,
            );
            writer.write_all(stats.as_bytes()).await?;
            Ok(Outcome::Continue)
        }
        Some(&"items") | Some(&"slabs") | Some(&"sizes") => {
            writer.write_all(b"END\r\n").await?;
            Ok(Outcome::Continue)
        }
        _ => error_reply(writer).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{BufReader, BufWriter};

    /// Feeds `input` through the ASCII parser command-by-command and
    /// collects everything written back.
    async fn exec(store: &Arc<SharedStore>, input: &[u8]) -> Vec<u8> {
        let (mut client, server) = tokio::io::duplex(1 << 20);
        let (read_half, write_half) = tokio::io::split(server);
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        loop {
            let buffered = reader.fill_buf().await.unwrap();
            if buffered.is_empty() {
                break;
            }
            match command(&mut reader, &mut writer, store).await {
                Ok(Outcome::Continue) => writer.flush().await.unwrap(),
                Ok(Outcome::Close) | Err(_) => {
                    writer.flush().await.unwrap();
                    break;
                }
            }
        }
        drop(reader);
        drop(writer);

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        output
    }

    #[tokio::test]
    async fn test_simple_set_get() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"set foo 0 0 3\r\nbar\r\nget foo\r\n").await;
        assert_eq!(out, b"STORED\r\nVALUE foo 0 3\r\nbar\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_add_conflict() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set foo 0 0 3\r\nbar\r\n").await;

        let out = exec(&store, b"add foo 0 0 3\r\nbaz\r\nget foo\r\n").await;
        assert_eq!(out, b"NOT_STORED\r\nVALUE foo 0 3\r\nbar\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_add_then_replace() {
        let store = Arc::new(SharedStore::new());

        let out = exec(&store, b"replace foo 0 0 3\r\nbar\r\n").await;
        assert_eq!(out, b"NOT_STORED\r\n");

        let out = exec(&store, b"add foo 0 0 3\r\nbar\r\n").await;
        assert_eq!(out, b"STORED\r\n");

        let out = exec(&store, b"replace foo 0 0 3\r\nbaz\r\nget foo\r\n").await;
        assert_eq!(out, b"STORED\r\nVALUE foo 0 3\r\nbaz\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_append_prepend() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set k 7 0 3\r\nbbb\r\n").await;

        let out = exec(&store, b"append k 0 0 3\r\nccc\r\n").await;
        assert_eq!(out, b"STORED\r\n");
        let out = exec(&store, b"prepend k 0 0 3\r\naaa\r\nget k\r\n").await;
        // Flags from the original record survive concatenation.
        assert_eq!(out, b"STORED\r\nVALUE k 7 9\r\naaabbbccc\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_cas_mismatch_and_match() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set k 0 0 2\r\nv1\r\n").await;
        let cas = store.get(b"k").unwrap().cas;

        let out = exec(&store, b"cas k 0 0 2 999999\r\nv2\r\n").await;
        assert_eq!(out, b"EXISTS\r\n");

        let out = exec(&store, format!("cas k 0 0 2 {cas}\r\nv2\r\n").as_bytes()).await;
        assert_eq!(out, b"STORED\r\n");

        let out = exec(&store, b"cas missing 0 0 1 1\r\nx\r\n").await;
        assert_eq!(out, b"NOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn test_gets_reports_cas() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set k 3 0 2\r\nhi\r\n").await;
        let cas = store.get(b"k").unwrap().cas;

        let out = exec(&store, b"gets k\r\n").await;
        let expected = format!("VALUE k 3 2 {cas}\r\nhi\r\nEND\r\n");
        assert_eq!(out, expected.as_bytes());
    }

    #[tokio::test]
    async fn test_get_multiple_keys() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set a 0 0 1\r\n1\r\nset b 0 0 1\r\n2\r\n").await;

        let out = exec(&store, b"get a missing b\r\n").await;
        assert_eq!(out, b"VALUE a 0 1\r\n1\r\nVALUE b 0 1\r\n2\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set k 0 0 1\r\nx\r\n").await;

        let out = exec(&store, b"delete k\r\ndelete k\r\n").await;
        assert_eq!(out, b"DELETED\r\nNOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn test_incr_non_numeric() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set foo 0 0 3\r\nbar\r\n").await;

        let out = exec(&store, b"incr foo 1\r\n").await;
        assert_eq!(
            out,
            b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n"
        );
    }

    #[tokio::test]
    async fn test_incr_saturates_at_max() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set n 0 0 20\r\n18446744073709551610\r\n").await;

        let out = exec(&store, b"incr n 100\r\n").await;
        assert_eq!(out, b"18446744073709551615\r\n");
    }

    #[tokio::test]
    async fn test_decr_saturates_at_zero() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set n 0 0 1\r\n5\r\n").await;

        let out = exec(&store, b"decr n 100\r\n").await;
        assert_eq!(out, b"0\r\n");
    }

    #[tokio::test]
    async fn test_incr_missing_key() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"incr nope 1\r\n").await;
        assert_eq!(out, b"NOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn test_flush_all_hides_records() {
        let store = Arc::new(SharedStore::new());
        exec(&store, b"set k 0 0 1\r\nx\r\n").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let out = exec(&store, b"flush_all\r\nget k\r\n").await;
        assert_eq!(out, b"OK\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_noreply_suppresses_responses() {
        let store = Arc::new(SharedStore::new());

        let out = exec(
            &store,
            b"set k 0 0 1 noreply\r\nx\r\nadd k 0 0 1 noreply\r\ny\r\ndelete k noreply\r\nget k\r\n",
        )
        .await;
        assert_eq!(out, b"END\r\n");
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"bogus\r\nversion\r\n").await;

        let expected = format!("ERROR\r\nVERSION {}\r\n", crate::VERSION);
        assert_eq!(out, expected.as_bytes());
    }

    #[tokio::test]
    async fn test_malformed_bytes_argument() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"set k 0 0 NaN\r\n").await;
        assert!(out.starts_with(b"CLIENT_ERROR invalid bytes argument"));
    }

    #[tokio::test]
    async fn test_bad_data_chunk() {
        let store = Arc::new(SharedStore::new());
        // Declared 3 bytes but the terminator is garbage.
        let out = exec(&store, b"set k 0 0 3\r\nbarXY\r\n").await;
        assert!(out.starts_with(b"CLIENT_ERROR bad data chunk"));
    }

    #[tokio::test]
    async fn test_lf_only_lines_tolerated() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"set foo 0 0 3\nbar\nget foo\n").await;
        assert_eq!(out, b"STORED\r\nVALUE foo 0 3\r\nbar\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_stats_and_subcommands() {
        let store = Arc::new(SharedStore::new());

        let out = exec(&store, b"stats\r\n").await;
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("STAT pid "));
        assert!(text.contains("STAT time "));
        assert!(text.contains(&format!("STAT version {}", crate::VERSION)));
        assert!(text.ends_with("END\r\n"));

        let out = exec(&store, b"stats items\r\nstats slabs\r\nstats sizes\r\n").await;
        assert_eq!(out, b"END\r\nEND\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_verbosity() {
        let store = Arc::new(SharedStore::new());
        let out = exec(&store, b"verbosity 1\r\nverbosity 5\r\n").await;
        assert_eq!(out, b"OK\r\nERROR\r\n");
    }

    #[tokio::test]
    async fn test_object_too_large_keeps_connection() {
        let store = Arc::new(SharedStore::with_limits(0, 4));

        let out = exec(&store, b"set k 0 0 8\r\n01234567\r\nversion\r\n").await;
        let expected = format!(
            "SERVER_ERROR object too large for cache\r\nVERSION {}\r\n",
            crate::VERSION
        );
        assert_eq!(out, expected.as_bytes());
    }
}
