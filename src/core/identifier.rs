use ethereum_types::H160;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::IdentifierError;

/// Number of bits in an identifier. Needs to match SHA1's output length.
pub const ID_BITS: usize = 160;
pub const ID_BYTES: usize = ID_BITS / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeID(pub H160);

impl NodeID {
    pub fn zero() -> Self {
        NodeID(H160::zero())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentifierError> {
        if bytes.len() != ID_BYTES {
            return Err(IdentifierError::InvalidLength {
                expected: ID_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self(H160::from_slice(bytes)))
    }

    /// Parse a 40 digit hex string, with or without a leading `0x`.
    pub fn from_hex(s: &str) -> Result<Self, IdentifierError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn from_hashed<S: AsRef<[u8]>>(input: &S) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(input.as_ref());
        let digest = hasher.finalize();
        Self(H160::from_slice(&digest))
    }

    /// The identifier of the node listening at `ip:port`.
    pub fn for_endpoint(ip: Ipv4Addr, port: u16) -> Self {
        Self::from_hashed(&format!("{ip}:{port}"))
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        self.0.as_fixed_bytes()
    }

    pub fn with_bit(&self, bit_index: usize, bit: u8) -> Self {
        let mut bytes: [u8; ID_BYTES] = *self.0.as_fixed_bytes();

        let byte_index = bit_index / 8;
        let bit_within_byte = bit_index % 8;
        let shift_amount = 7 - bit_within_byte;

        if bit == 1 {
            bytes[byte_index] |= 1 << shift_amount;
        } else {
            bytes[byte_index] &= !(1 << shift_amount);
        }

        NodeID(H160::from(bytes))
    }

    pub fn distance(&self, other: &NodeID) -> Distance {
        Distance(self.0 ^ other.0)
    }

    /// Number of leading bits shared with `other`, scanning from the most
    /// significant bit. Only equal identifiers share all 160.
    pub fn common_prefix_len(&self, other: &NodeID) -> usize {
        self.distance(other).leading_zeros()
    }

    /// Return a short, human-friendly hex for logging, like ab12cd34…ef90a1b2
    pub fn short_hex(&self) -> String {
        let b = self.0.to_fixed_bytes();
        format!(
            "{:02x}{:02x}{:02x}{:02x}…{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[16], b[17], b[18], b[19]
        )
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

/// XOR distance between two identifiers. Orders as a 160-bit unsigned
/// big-endian integer, so `a < b` means "a is closer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance(H160);

impl Distance {
    pub fn leading_zeros(&self) -> usize {
        let mut zeros = 0;
        for byte in self.0.as_bytes() {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros() as usize;
                break;
            }
        }
        zeros
    }
}

/// A known participant of the network (a "contact").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeInfo {
    #[serde(with = "serde_ipv4")]
    pub ip_address: Ipv4Addr,
    pub tcp_port: u16,
    pub node_id: NodeID,
}

impl NodeInfo {
    /// Build a contact for `ip:port`, deriving its identifier from the endpoint.
    pub fn from_endpoint(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip_address: ip,
            tcp_port: port,
            node_id: NodeID::for_endpoint(ip, port),
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip_address, self.tcp_port)
    }
}

mod serde_ipv4 {
    use serde::Serializer;
    use std::net::Ipv4Addr;

    pub fn serialize<S>(ip: &Ipv4Addr, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&ip.to_string())
    }
}
