use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::NodeConfig,
    core::identifier::NodeInfo,
    core::routing_table::{InsertOutcome, RoutingTable, SlotEntry},
    core::NodeState,
    error::{CodecError, HandshakeError},
};

pub mod bits;
pub mod packet;

use self::packet::{MessageType, Packet, HEADER_LEN, PROTOCOL_VERSION};

const LISTEN_BACKLOG: u32 = 1024;

/// Progress of the accepting side of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    AwaitingConnection,
    BuildingWelcome,
    Sent,
    Closed,
}

/// Progress of the joining side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinerState {
    Connecting,
    AwaitingWelcome,
    Applied,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeSent {
    pub peer: NodeInfo,
    pub insert: InsertOutcome,
    pub peers_sent: usize,
    pub state: ListenerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub sender_name: String,
    pub offered: usize, // contacts carried by the welcome
    pub stored: usize,  // of those, how many the table kept
    pub bootstrap_added: bool,
    pub state: JoinerState,
}

fn advance<S: Debug + Copy>(state: &mut S, next: S) {
    let from = *state;
    trace!(?from, to = ?next, "handshake state");
    *state = next;
}

/// A TCP socket that may share its local address with our own listener.
fn reusable_socket() -> io::Result<TcpSocket> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuseport(true)?;
    Ok(socket)
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, HandshakeError>>,
) -> Result<T, HandshakeError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| HandshakeError::Timeout(limit))?
}

/// Contact for the remote end of an accepted connection. Joiners connect from
/// their listening endpoint, so this is the address they accept on. The wire
/// format only carries IPv4, so other addresses are refused.
pub fn contact_for(addr: SocketAddr) -> Result<NodeInfo, HandshakeError> {
    let ip = match addr {
        SocketAddr::V4(a) => *a.ip(),
        SocketAddr::V6(a) => a
            .ip()
            .to_ipv4_mapped()
            .ok_or(HandshakeError::UnsupportedAddress(addr))?,
    };
    Ok(NodeInfo::from_endpoint(ip, addr.port()))
}

/// Record `peer` and build the welcome it should receive. Runs under the
/// node lock so the packet reflects the table right after the insertion.
pub fn build_welcome(node: &mut NodeState, peer: NodeInfo) -> (InsertOutcome, Packet) {
    let insert = node.routing_table.insert(peer);
    let peers = node.routing_table.known_contacts(Some(peer.node_id));
    (insert, Packet::welcome(node.name.clone(), peers))
}

/// Fold a welcome into the table. Nothing is inserted unless the packet is a
/// WELCOME of our version. Returns how many offered contacts were stored and
/// whether the bootstrap peer itself had to be added.
pub fn apply_welcome(
    table: &mut RoutingTable,
    packet: &Packet,
    bootstrap: NodeInfo,
) -> Result<(usize, bool), HandshakeError> {
    if packet.version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion {
            expected: PROTOCOL_VERSION,
            found: packet.version,
        }
        .into());
    }
    if packet.message_type != MessageType::Welcome {
        return Err(HandshakeError::UnexpectedMessageType(
            packet.message_type.code(),
        ));
    }

    let mut stored = 0;
    for peer in &packet.peers {
        let outcome = table.insert(*peer);
        debug!(peer = %peer.node_id.short_hex(), ?outcome, "welcome contact");
        if outcome.stored() {
            stored += 1;
        }
    }

    let bootstrap_added = !table.contains(bootstrap.node_id) && table.insert(bootstrap).stored();
    Ok((stored, bootstrap_added))
}

/// Read exactly one packet, using the header to learn how long it is.
pub async fn read_packet<S>(stream: &mut S) -> Result<Packet, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; HEADER_LEN];
    stream.read_exact(&mut buf).await?;
    let frame_len = Packet::frame_len(&buf)?;
    buf.resize(frame_len, 0);
    stream.read_exact(&mut buf[HEADER_LEN..]).await?;
    Ok(Packet::from_bytes(&buf)?)
}

/// Listener role: insert the connecting peer, send it our contacts, close.
pub async fn serve_welcome<S>(
    stream: &mut S,
    peer: NodeInfo,
    node: &Mutex<NodeState>,
) -> Result<WelcomeSent, HandshakeError>
where
    S: AsyncWrite + Unpin,
{
    let mut state = ListenerState::AwaitingConnection;
    advance(&mut state, ListenerState::BuildingWelcome);

    let (insert, packet) = {
        let mut node = node.lock().await;
        build_welcome(&mut node, peer)
    };
    let bytes = packet.to_bytes()?;
    stream.write_all(&bytes).await?;
    advance(&mut state, ListenerState::Sent);

    stream.shutdown().await?;
    advance(&mut state, ListenerState::Closed);

    Ok(WelcomeSent {
        peer,
        insert,
        peers_sent: packet.num_peers(),
        state,
    })
}

/// Joiner role: read the bootstrap peer's welcome and learn its contacts.
/// The packet is fully decoded before the table is touched.
pub async fn accept_welcome<S>(
    stream: &mut S,
    bootstrap: NodeInfo,
    node: &Mutex<NodeState>,
) -> Result<JoinOutcome, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut state = JoinerState::AwaitingWelcome;

    let packet = read_packet(stream).await?;
    let (stored, bootstrap_added) = {
        let mut node = node.lock().await;
        apply_welcome(&mut node.routing_table, &packet, bootstrap)?
    };
    advance(&mut state, JoinerState::Applied);
    advance(&mut state, JoinerState::Closed);

    Ok(JoinOutcome {
        sender_name: packet.sender_name,
        offered: packet.peers.len(),
        stored,
        bootstrap_added,
        state,
    })
}

/// Serve one accepted connection within `limit`. The stream is dropped, and so
/// closed, whatever the outcome.
pub async fn handle_inbound<S>(
    mut stream: S,
    src_addr: SocketAddr,
    node: &Mutex<NodeState>,
    limit: Duration,
) -> Result<WelcomeSent, HandshakeError>
where
    S: AsyncWrite + Unpin,
{
    let peer = contact_for(src_addr)?;
    with_timeout(limit, serve_welcome(&mut stream, peer, node)).await
}

/// Connect to `bootstrap` from `local`, our listening endpoint, and run the
/// joiner role within `limit`.
pub async fn join_via(
    local: SocketAddrV4,
    bootstrap: SocketAddrV4,
    node: &Mutex<NodeState>,
    limit: Duration,
) -> Result<JoinOutcome, HandshakeError> {
    let contact = NodeInfo::from_endpoint(*bootstrap.ip(), bootstrap.port());
    with_timeout(limit, async {
        let mut state = JoinerState::Connecting;
        let socket = reusable_socket()?;
        socket.bind(local.into())?;
        let mut stream = socket.connect(bootstrap.into()).await?;
        advance(&mut state, JoinerState::AwaitingWelcome);

        accept_welcome(&mut stream, contact, node).await
    })
    .await
}

/// A node: its TCP listener plus the state shared by every handshake.
pub struct ProtocolManager {
    pub node: Arc<Mutex<NodeState>>,
    pub my_info: NodeInfo,
    listener: TcpListener,
    config: NodeConfig,
}

impl ProtocolManager {
    pub async fn bind(config: NodeConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let socket = reusable_socket()?;
        socket.bind(config.bind.into())?;
        let listener = socket.listen(LISTEN_BACKLOG)?;
        let local_addr = match listener.local_addr()? {
            SocketAddr::V4(addr) => addr,
            other => anyhow::bail!("listener bound to non-IPv4 address {other}"),
        };

        let node = NodeState::new(local_addr, config.name_for(local_addr));
        let my_info = node.my_info;
        info!(
            "This peer address is {} located at {} [{}]",
            local_addr, node.name, my_info.node_id
        );

        Ok(Self {
            node: Arc::new(Mutex::new(node)),
            my_info,
            listener,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.my_info.socket_addr()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Join the network through `bootstrap`.
    pub async fn join(&self, bootstrap: SocketAddrV4) -> Result<JoinOutcome, HandshakeError> {
        info!(%bootstrap, "Joining");
        let outcome = join_via(
            self.local_addr(),
            bootstrap,
            &self.node,
            self.config.handshake_timeout,
        ).await?;
        info!(
            sender = %outcome.sender_name,
            offered = outcome.offered,
            stored = outcome.stored,
            "Joined network"
        );
        Ok(outcome)
    }

    /// Consistent copy of the routing table's occupied buckets.
    pub async fn snapshot(&self) -> Vec<SlotEntry> {
        self.node.lock().await.routing_table.snapshot()
    }

    /// Accept connections forever, one task per handshake. A failed handshake
    /// is logged and never stops the loop.
    pub async fn run(self) {
        let limit = self.config.handshake_timeout;
        loop {
            match self.listener.accept().await {
                Ok((stream, src_addr)) => {
                    trace!(%src_addr, "TCP accept");
                    let node = Arc::clone(&self.node);
                    tokio::spawn(async move {
                        match handle_inbound(stream, src_addr, &node, limit).await {
                            Ok(sent) => info!(
                                %src_addr,
                                peer = %sent.peer.node_id.short_hex(),
                                insert = ?sent.insert,
                                peers_sent = sent.peers_sent,
                                "Welcomed peer"
                            ),
                            Err(e) => warn!(%src_addr, error = %e, "Inbound handshake failed"),
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                    continue;
                }
            }
        }
    }
}
