//! Binary Protocol Framing
//!
//! The memcached binary protocol frames every message with a fixed 24-byte
//! big-endian header, optionally followed by extras, a key and a value:
//!
//! ```text
//!   0       1       2       3
//! ┌───────┬───────┬───────────────┐
//! │ magic │opcode │    key len    │
//! ├───────┼───────┼───────────────┤
//! │extras │ dtype │vbucket/status │
//! ├───────┴───────┴───────────────┤
//! │          total body           │
//! ├───────────────────────────────┤
//! │            opaque             │
//! ├───────────────────────────────┤
//! │              cas              │
//! │                               │
//! └───────────────────────────────┘
//! ```
//!
//! Requests carry magic `0x80` and a vbucket id; responses carry magic
//! `0x81` and a status code in the same two bytes. `opaque` is echoed back
//! verbatim so clients can match responses to pipelined requests.

/// First byte of every binary request.
pub const REQUEST_MAGIC: u8 = 0x80;

/// First byte of every binary response.
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Fixed header size for requests and responses alike.
pub const HEADER_LEN: usize = 24;

/// Binary protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Quit = 0x07,
    Flush = 0x08,
    GetQ = 0x09,
    NoOp = 0x0a,
    Version = 0x0b,
    GetK = 0x0c,
    GetKQ = 0x0d,
    Append = 0x0e,
    Prepend = 0x0f,
    Stat = 0x10,
    SetQ = 0x11,
    AddQ = 0x12,
    ReplaceQ = 0x13,
    DeleteQ = 0x14,
    IncrementQ = 0x15,
    DecrementQ = 0x16,
    QuitQ = 0x17,
    FlushQ = 0x18,
    AppendQ = 0x19,
    PrependQ = 0x1a,
}

impl Opcode {
    /// Maps a wire byte to a known opcode, or `None` for anything this
    /// server has never heard of.
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0x00 => Self::Get,
            0x01 => Self::Set,
            0x02 => Self::Add,
            0x03 => Self::Replace,
            0x04 => Self::Delete,
            0x05 => Self::Increment,
            0x06 => Self::Decrement,
            0x07 => Self::Quit,
            0x08 => Self::Flush,
            0x09 => Self::GetQ,
            0x0a => Self::NoOp,
            0x0b => Self::Version,
            0x0c => Self::GetK,
            0x0d => Self::GetKQ,
            0x0e => Self::Append,
            0x0f => Self::Prepend,
            0x10 => Self::Stat,
            0x11 => Self::SetQ,
            0x12 => Self::AddQ,
            0x13 => Self::ReplaceQ,
            0x14 => Self::DeleteQ,
            0x15 => Self::IncrementQ,
            0x16 => Self::DecrementQ,
            0x17 => Self::QuitQ,
            0x18 => Self::FlushQ,
            0x19 => Self::AppendQ,
            0x1a => Self::PrependQ,
            _ => return None,
        })
    }
}

/// Binary protocol response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    NoError = 0x0000,
    KeyNotFound = 0x0001,
    KeyExists = 0x0002,
    ValueTooLarge = 0x0003,
    InvalidArguments = 0x0004,
    NotStored = 0x0005,
    /// Incr/Decr on a non-numeric value.
    NonNumericValue = 0x0006,
    UnknownCommand = 0x0081,
    OutOfMemory = 0x0082,
    NotSupported = 0x0083,
    InternalError = 0x0084,
    Busy = 0x0085,
    TemporaryFailure = 0x0086,
}

/// A decoded request header.
#[derive(Debug, Clone, Copy)]
pub struct RequestHeader {
    pub magic: u8,
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    pub vbucket_id: u16,
    pub total_body: u32,
    /// Echoed verbatim into the response.
    pub opaque: u32,
    pub cas: u64,
}

impl RequestHeader {
    /// Decodes the fixed header from its 24 wire bytes (big-endian).
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Self {
        Self {
            magic: raw[0],
            opcode: raw[1],
            key_len: u16::from_be_bytes([raw[2], raw[3]]),
            extras_len: raw[4],
            data_type: raw[5],
            vbucket_id: u16::from_be_bytes([raw[6], raw[7]]),
            total_body: u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]),
            opaque: u32::from_be_bytes([raw[12], raw[13], raw[14], raw[15]]),
            cas: u64::from_be_bytes([
                raw[16], raw[17], raw[18], raw[19], raw[20], raw[21], raw[22], raw[23],
            ]),
        }
    }

    /// Length of the value section, if the framing adds up.
    pub fn value_len(&self) -> Option<usize> {
        (self.total_body as usize)
            .checked_sub(self.key_len as usize)?
            .checked_sub(self.extras_len as usize)
    }
}

/// A response header under construction.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    pub status: Status,
    pub total_body: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl ResponseHeader {
    /// Starts a success response for `request`: opcode and opaque echoed,
    /// everything else zeroed.
    pub fn for_request(request: &RequestHeader) -> Self {
        Self {
            opcode: request.opcode,
            key_len: 0,
            extras_len: 0,
            data_type: 0,
            status: Status::NoError,
            total_body: 0,
            opaque: request.opaque,
            cas: 0,
        }
    }

    /// Encodes the fixed header into its 24 wire bytes (big-endian).
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        raw[0] = RESPONSE_MAGIC;
        raw[1] = self.opcode;
        raw[2..4].copy_from_slice(&self.key_len.to_be_bytes());
        raw[4] = self.extras_len;
        raw[5] = self.data_type;
        raw[6..8].copy_from_slice(&(self.status as u16).to_be_bytes());
        raw[8..12].copy_from_slice(&self.total_body.to_be_bytes());
        raw[12..16].copy_from_slice(&self.opaque.to_be_bytes());
        raw[16..24].copy_from_slice(&self.cas.to_be_bytes());
        raw
    }
}
