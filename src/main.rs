use std::net::SocketAddrV4;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kadpeer::protocol::ProtocolManager;
use kadpeer::NodeConfig;

/// A Kademlia peer. Run with no arguments to start a new network, or with
/// `-p ip:port` to join an existing one.
#[derive(Debug, Parser)]
#[command(name = "kadpeer")]
struct Cli {
    /// Peer to join through, as ip:port
    #[arg(short = 'p', long = "peer")]
    peer: Option<SocketAddrV4>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:0")]
    bind: SocketAddrV4,

    /// Name sent to joining peers (default: peer<port>)
    #[arg(short, long)]
    name: Option<String>,

    /// Per-handshake timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Print the routing table as JSON once startup is done
    #[arg(long)]
    dump_table: bool,
}

impl Cli {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            bind: self.bind,
            name: self.name.clone(),
            handshake_timeout: Duration::from_millis(self.timeout_ms),
            bootstrap: self.peer,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let manager = ProtocolManager::bind(cli.node_config()).await?;

    match manager.config().bootstrap {
        Some(peer) => {
            manager
                .join(peer)
                .await
                .with_context(|| format!("joining through {peer}"))?;
            for entry in manager.snapshot().await {
                info!(
                    slot = entry.slot,
                    addr = %entry.contact.socket_addr(),
                    id = %entry.contact.node_id,
                    "Known peer"
                );
            }
        }
        None => info!("Creating new network"),
    }

    if cli.dump_table {
        println!("{}", serde_json::to_string_pretty(&manager.snapshot().await)?);
    }

    manager.run().await;
    Ok(())
}
