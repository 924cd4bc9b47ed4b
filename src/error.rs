use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Raised when bytes or hex text cannot form a 160-bit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("invalid identifier length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid identifier hex: {0}")]
    InvalidHex(String),
}

/// Errors produced while packing or unpacking a handshake packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A value does not fit the bit width reserved for it on the wire.
    #[error("field `{field}` overflows {width} bits (value {value})")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },
    #[error("truncated packet: need {needed} bytes, have {available}")]
    TruncatedPacket { needed: usize, available: usize },
    #[error("unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { expected: u8, found: u8 },
    #[error("sender name is not valid utf-8")]
    InvalidSenderName,
    #[error("packet has {extra} trailing bytes after a {frame_len}-byte frame")]
    TrailingBytes { frame_len: usize, extra: usize },
}

/// Failure of a single handshake attempt. None of these are fatal to the node.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unexpected message type {0}, expected WELCOME")]
    UnexpectedMessageType(u16),
    #[error("connection closed before the handshake completed")]
    Incomplete(#[source] std::io::Error),
    #[error("handshake did not complete within {0:?}")]
    Timeout(Duration),
    #[error("peer address {0} is not IPv4")]
    UnsupportedAddress(SocketAddr),
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for HandshakeError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => HandshakeError::Incomplete(e),
            _ => HandshakeError::Io(e),
        }
    }
}
