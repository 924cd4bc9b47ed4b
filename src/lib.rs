pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
mod test_support;

// Re-export commonly used types for consumers and integration tests
pub use crate::config::NodeConfig;
pub use crate::core::identifier::{Distance, NodeID, NodeInfo};
pub use crate::core::routing_table::{InsertOutcome, RoutingTable, SlotEntry};
pub use crate::error::{CodecError, HandshakeError, IdentifierError};
pub use crate::protocol::packet::{MessageType, Packet, PROTOCOL_VERSION};
