//! The handshake packet exchanged when a peer joins.
//!
//! ```text
//! bit offset  field            width
//! 0           version          4
//! 4           message type     12
//! 16          peer count       8
//! 24          sender name len  8
//! 32          sender name      8 * len
//! ..          peers            48 each (4 octets IPv4 + 2 bytes big-endian port)
//! ```

use std::net::Ipv4Addr;

use super::bits::BitField;
use crate::core::identifier::NodeInfo;
use crate::error::CodecError;

/// The only protocol version this node speaks.
pub const PROTOCOL_VERSION: u8 = 1;

pub const HEADER_LEN: usize = 4;
pub const PEER_RECORD_LEN: usize = 6;

const VERSION: BitField = BitField::new("version", 0, 4);
const MESSAGE_TYPE: BitField = BitField::new("message_type", 4, 12);
const NUM_PEERS: BitField = BitField::new("num_peers", 16, 8);
const SENDER_NAME_LEN: BitField = BitField::new("sender_name_len", 24, 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Welcome,
    /// Any code other than WELCOME's. Packets built through
    /// [`Packet::from_fields`] never hold `Other(1)`.
    Other(u16),
}

impl MessageType {
    pub fn code(self) -> u16 {
        match self {
            MessageType::Welcome => 1,
            MessageType::Other(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MessageType::Welcome,
            other => MessageType::Other(other),
        }
    }
}

/// A decoded or about-to-be-encoded handshake packet. Peer identifiers are
/// not carried on the wire; decoding derives them from each endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub message_type: MessageType,
    pub sender_name: String,
    pub peers: Vec<NodeInfo>,
}

impl Packet {
    pub fn from_fields(
        version: u8,
        message_type: MessageType,
        sender_name: impl Into<String>,
        peers: Vec<NodeInfo>,
    ) -> Self {
        Self {
            version,
            message_type: MessageType::from_code(message_type.code()),
            sender_name: sender_name.into(),
            peers,
        }
    }

    pub fn welcome(sender_name: impl Into<String>, peers: Vec<NodeInfo>) -> Self {
        Self::from_fields(PROTOCOL_VERSION, MessageType::Welcome, sender_name, peers)
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    /// Total encoded length announced by a 4-byte header, after checking
    /// that the header speaks our protocol version.
    pub fn frame_len(header: &[u8]) -> Result<usize, CodecError> {
        if header.len() < HEADER_LEN {
            return Err(CodecError::TruncatedPacket {
                needed: HEADER_LEN,
                available: header.len(),
            });
        }
        let version = VERSION.read(header)? as u8;
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                found: version,
            });
        }
        let name_len = SENDER_NAME_LEN.read(header)? as usize;
        let num_peers = NUM_PEERS.read(header)? as usize;
        Ok(HEADER_LEN + name_len + num_peers * PEER_RECORD_LEN)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let name = self.sender_name.as_bytes();
        let mut out = vec![0u8; HEADER_LEN];
        VERSION.write(&mut out, self.version as u64)?;
        MESSAGE_TYPE.write(&mut out, self.message_type.code() as u64)?;
        NUM_PEERS.write(&mut out, self.peers.len() as u64)?;
        SENDER_NAME_LEN.write(&mut out, name.len() as u64)?;

        out.reserve(name.len() + self.peers.len() * PEER_RECORD_LEN);
        out.extend_from_slice(name);
        for peer in &self.peers {
            out.extend_from_slice(&peer.ip_address.octets());
            out.extend_from_slice(&peer.tcp_port.to_be_bytes());
        }
        Ok(out)
    }

    /// Decode exactly one packet. Either the whole buffer is accepted or an
    /// error is returned; nothing is partially decoded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let frame_len = Self::frame_len(bytes)?;
        if bytes.len() < frame_len {
            return Err(CodecError::TruncatedPacket {
                needed: frame_len,
                available: bytes.len(),
            });
        }
        if bytes.len() > frame_len {
            return Err(CodecError::TrailingBytes {
                frame_len,
                extra: bytes.len() - frame_len,
            });
        }

        let message_type = MessageType::from_code(MESSAGE_TYPE.read(bytes)? as u16);
        let name_len = SENDER_NAME_LEN.read(bytes)? as usize;
        let name_end = HEADER_LEN + name_len;
        let sender_name = std::str::from_utf8(&bytes[HEADER_LEN..name_end])
            .map_err(|_| CodecError::InvalidSenderName)?
            .to_owned();

        let peers = bytes[name_end..]
            .chunks_exact(PEER_RECORD_LEN)
            .map(|rec| {
                let ip = Ipv4Addr::new(rec[0], rec[1], rec[2], rec[3]);
                let port = u16::from_be_bytes([rec[4], rec[5]]);
                NodeInfo::from_endpoint(ip, port)
            })
            .collect();

        Ok(Self {
            version: PROTOCOL_VERSION,
            message_type,
            sender_name,
            peers,
        })
    }
}
