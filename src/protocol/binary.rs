//! Binary Protocol Codec
//!
//! Reads 24-byte framed requests, runs them against the store, and writes
//! bit-exact framed responses. Quiet ("Q") opcode variants stay silent on
//! their success path (and on miss, for `GetQ`) so clients can pipeline
//! them cheaply; errors are always reported.
//!
//! Implemented opcodes: `Get`/`GetQ`, `Set`/`SetQ`, `Add`/`AddQ`,
//! `Flush`/`FlushQ`, `Quit`/`QuitQ`, `NoOp`. Every other opcode drains its
//! body and answers status `0x0083 Not supported` so the connection stays
//! usable.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::protocol::types::{
    Opcode, RequestHeader, ResponseHeader, Status, HEADER_LEN, REQUEST_MAGIC,
};
use crate::protocol::{Outcome, ProtocolError};
use crate::store::{Record, SharedStore, StoreError};

/// Reads one binary command from `reader`, executes it against `store`, and
/// writes the response (if the opcode calls for one) to `writer`.
pub async fn command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
) -> Result<Outcome, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).await?;
    let request = RequestHeader::decode(&raw);

    if request.magic != REQUEST_MAGIC {
        return Err(ProtocolError::Client(format!(
            "bad request magic {:#04x}",
            request.magic
        )));
    }

    match Opcode::from_u8(request.opcode) {
        Some(op @ (Opcode::Set | Opcode::SetQ | Opcode::Add | Opcode::AddQ)) => {
            set_command(reader, writer, store, &request, op).await
        }
        Some(op @ (Opcode::Get | Opcode::GetQ)) => {
            get_command(reader, writer, store, &request, op).await
        }
        Some(op @ (Opcode::Flush | Opcode::FlushQ)) => {
            flush_command(reader, writer, store, &request, op).await
        }
        Some(Opcode::Quit) => {
            respond(writer, &ResponseHeader::for_request(&request), &[], &[]).await?;
            Ok(Outcome::Close)
        }
        Some(Opcode::QuitQ) => Ok(Outcome::Close),
        Some(Opcode::NoOp) => {
            respond(writer, &ResponseHeader::for_request(&request), &[], &[]).await?;
            Ok(Outcome::Continue)
        }
        _ => {
            // Keep the stream framed, then report the opcode as unsupported.
            drain(reader, request.total_body as usize).await?;
            let mut response = ResponseHeader::for_request(&request);
            response.status = Status::NotSupported;
            respond(writer, &response, &[], &[]).await?;
            debug!(opcode = request.opcode, "unsupported binary opcode");
            Ok(Outcome::Continue)
        }
    }
}

/// `Set`/`SetQ`/`Add`/`AddQ`: extras are flags(4) + exptime(4), then key and
/// value. A non-zero request CAS must match the live record's token.
async fn set_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    request: &RequestHeader,
    op: Opcode,
) -> Result<Outcome, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let quiet = matches!(op, Opcode::SetQ | Opcode::AddQ);

    let value_len = match request.value_len() {
        Some(len) if request.extras_len == 8 && request.key_len > 0 => len,
        _ => return invalid_close(writer, request).await,
    };

    let mut extras = [0u8; 8];
    reader.read_exact(&mut extras).await?;
    let flags = u32::from_be_bytes([extras[0], extras[1], extras[2], extras[3]]);
    let exptime = u32::from_be_bytes([extras[4], extras[5], extras[6], extras[7]]);
    let key = read_bytes(reader, request.key_len as usize).await?;
    let value = read_bytes(reader, value_len).await?;

    let mut response = ResponseHeader::for_request(request);

    if request.cas != 0 {
        if let Some(existing) = store.get(&key) {
            if existing.cas != request.cas {
                response.status = Status::KeyExists;
                respond(writer, &response, &[], &[]).await?;
                return Ok(Outcome::Continue);
            }
        }
    }

    if matches!(op, Opcode::Add | Opcode::AddQ) && store.get(&key).is_some() {
        response.status = Status::KeyExists;
        respond(writer, &response, &[], &[]).await?;
        return Ok(Outcome::Continue);
    }

    match store.set(Record::new(key, flags, exptime, value)) {
        Ok(cas) => {
            if quiet {
                return Ok(Outcome::Continue);
            }
            response.cas = cas;
            respond(writer, &response, &[], &[]).await?;
            Ok(Outcome::Continue)
        }
        Err(StoreError::ObjectTooLarge) => {
            response.status = Status::ValueTooLarge;
            respond(writer, &response, &[], &[]).await?;
            Ok(Outcome::Continue)
        }
    }
}

/// `Get`/`GetQ`: the response carries the record's flags as 4 extras bytes,
/// then the value. A quiet miss writes nothing at all.
async fn get_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    request: &RequestHeader,
    op: Opcode,
) -> Result<Outcome, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let quiet = op == Opcode::GetQ;

    match request.value_len() {
        Some(0) if request.extras_len == 0 && request.key_len > 0 => {}
        _ => return invalid_close(writer, request).await,
    }
    let key = read_bytes(reader, request.key_len as usize).await?;

    let mut response = ResponseHeader::for_request(request);
    match store.get(&key) {
        None => {
            if quiet {
                return Ok(Outcome::Continue);
            }
            response.status = Status::KeyNotFound;
            respond(writer, &response, &[], &[]).await?;
            Ok(Outcome::Continue)
        }
        Some(record) => {
            response.cas = record.cas;
            response.extras_len = 4;
            response.total_body = 4 + record.value.len() as u32;
            respond(writer, &response, &record.flags.to_be_bytes(), &record.value).await?;
            Ok(Outcome::Continue)
        }
    }
}

/// `Flush`/`FlushQ`: an optional 4-byte exptime in the extras is accepted
/// and ignored; the barrier is always installed at now.
async fn flush_command<R, W>(
    reader: &mut R,
    writer: &mut W,
    store: &SharedStore,
    request: &RequestHeader,
    op: Opcode,
) -> Result<Outcome, ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match request.extras_len {
        0 => {}
        4 => {
            let mut exptime = [0u8; 4];
            reader.read_exact(&mut exptime).await?;
        }
        _ => return invalid_close(writer, request).await,
    }

    store.flush();

    if op == Opcode::FlushQ {
        return Ok(Outcome::Continue);
    }
    respond(writer, &ResponseHeader::for_request(request), &[], &[]).await?;
    Ok(Outcome::Continue)
}

/// Reports a framing violation and ends the connection; after a header that
/// does not add up there is no safe way to resynchronise the stream.
async fn invalid_close<W>(
    writer: &mut W,
    request: &RequestHeader,
) -> Result<Outcome, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut response = ResponseHeader::for_request(request);
    response.status = Status::InvalidArguments;
    respond(writer, &response, &[], &[]).await?;
    Err(ProtocolError::Client("malformed binary request".to_string()))
}

async fn read_bytes<R>(reader: &mut R, len: usize) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

async fn drain<R>(reader: &mut R, mut len: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut scratch = [0u8; 4096];
    while len > 0 {
        let chunk = len.min(scratch.len());
        reader.read_exact(&mut scratch[..chunk]).await?;
        len -= chunk;
    }
    Ok(())
}

async fn respond<W>(
    writer: &mut W,
    header: &ResponseHeader,
    extras: &[u8],
    value: &[u8],
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&header.encode()).await?;
    if !extras.is_empty() {
        writer.write_all(extras).await?;
    }
    if !value.is_empty() {
        writer.write_all(value).await?;
    }
    Ok(())
}
