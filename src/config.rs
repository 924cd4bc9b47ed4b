use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

/// How long a single handshake may take before the connection is dropped.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest node name that fits the packet's 8-bit length field.
pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Address the TCP listener binds to. Port 0 picks an ephemeral port.
    pub bind: SocketAddrV4,
    /// Display name sent in welcome packets. Defaults to `peer<port>`.
    pub name: Option<String>,
    pub handshake_timeout: Duration,
    /// Peer to join through. `None` starts a new network.
    pub bootstrap: Option<SocketAddrV4>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            name: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            bootstrap: None,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.name {
            anyhow::ensure!(
                name.len() <= MAX_NAME_LEN,
                "node name is {} bytes, at most {MAX_NAME_LEN} fit in a packet",
                name.len()
            );
        }
        anyhow::ensure!(
            !self.handshake_timeout.is_zero(),
            "handshake timeout must be non-zero"
        );
        Ok(())
    }

    /// The configured name, or `peer<port>` for the port we actually bound.
    pub fn name_for(&self, bound: SocketAddrV4) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("peer{}", bound.port()))
    }
}
