use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use kadpeer::protocol::ProtocolManager;
use kadpeer::{CodecError, HandshakeError, NodeConfig, NodeInfo, Packet, RoutingTable};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

fn named(name: &str) -> NodeConfig {
    NodeConfig {
        name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(a) => a,
        other => panic!("expected an IPv4 address, got {other}"),
    }
}

#[tokio::test]
async fn second_joiner_learns_about_the_first() -> anyhow::Result<()> {
    let hub = ProtocolManager::bind(named("hub")).await?;
    let hub_addr = hub.local_addr();
    let hub_info = hub.my_info;
    let hub_node = hub.node.clone();
    tokio::spawn(hub.run());

    let b = ProtocolManager::bind(named("b")).await?;
    let b_join = b.join(hub_addr).await?;
    assert_eq!(b_join.sender_name, "hub");
    assert_eq!(b_join.offered, 0);
    {
        // b landed in an empty table, under the address it listens on
        let hub_node = hub_node.lock().await;
        assert!(hub_node.routing_table.contains(b.my_info.node_id));
        assert_eq!(
            hub_node.routing_table.find(b.my_info.node_id).map(|p| p.socket_addr()),
            Some(b.local_addr())
        );
    }

    let c = ProtocolManager::bind(named("c")).await?;
    let c_join = c.join(hub_addr).await?;
    assert_eq!(c_join.sender_name, "hub");

    // the hub keeps b unless c is closer to it in the same bucket
    let mut hub_expected = RoutingTable::new(hub_info.node_id);
    hub_expected.insert(b.my_info);
    hub_expected.insert(c.my_info);
    let hub_table = hub_node.lock().await.routing_table.snapshot();
    assert_eq!(hub_table, hub_expected.snapshot());

    let b_offered = hub_expected.contains(b.my_info.node_id);
    assert_eq!(c_join.offered, usize::from(b_offered));

    // c stores what it was offered, then the hub itself
    let mut c_expected = RoutingTable::new(c.my_info.node_id);
    if b_offered {
        assert!(c_expected.insert(b.my_info).stored());
    }
    c_expected.insert(hub_info);
    assert_eq!(c.snapshot().await, c_expected.snapshot());

    if b_offered && c_expected.contains(b.my_info.node_id) {
        let c_table = c.snapshot().await;
        assert!(c_table.iter().any(|e| e.contact.node_id == b.my_info.node_id
            && e.contact.socket_addr() == b.local_addr()));
    }
    Ok(())
}

#[tokio::test]
async fn hub_keeps_serving_after_abandoned_connection() -> anyhow::Result<()> {
    let hub = ProtocolManager::bind(named("hub")).await?;
    let hub_addr = hub.local_addr();
    tokio::spawn(hub.run());

    // connect and hang up without reading the welcome
    drop(TcpStream::connect(hub_addr).await?);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let joiner = ProtocolManager::bind(NodeConfig::default()).await?;
    let outcome = joiner.join(hub_addr).await?;
    assert_eq!(outcome.sender_name, "hub");
    Ok(())
}

#[tokio::test]
async fn join_rejects_incompatible_bootstrap() -> anyhow::Result<()> {
    // a fake bootstrap peer speaking protocol version 3
    let fake = TcpListener::bind("127.0.0.1:0").await?;
    let fake_addr = v4(fake.local_addr()?);
    let peer = NodeInfo::from_endpoint(*fake_addr.ip(), 4242);
    let bytes = Packet::from_fields(3, kadpeer::MessageType::Welcome, "old", vec![peer]).to_bytes()?;
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = fake.accept().await {
            let _ = stream.write_all(&bytes).await;
        }
    });

    let joiner = ProtocolManager::bind(NodeConfig::default()).await?;
    let err = joiner.join(fake_addr).await.unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::Codec(CodecError::UnsupportedVersion { found: 3, .. })
    ));
    assert!(joiner.snapshot().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn silent_bootstrap_times_out() -> anyhow::Result<()> {
    let silent = TcpListener::bind("127.0.0.1:0").await?;
    let silent_addr = v4(silent.local_addr()?);
    tokio::spawn(async move {
        // accept and hold the connection open without writing
        if let Ok((stream, _)) = silent.accept().await {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        }
    });

    let joiner = ProtocolManager::bind(NodeConfig {
        handshake_timeout: Duration::from_millis(100),
        ..Default::default()
    })
    .await?;
    let err = joiner.join(silent_addr).await.unwrap_err();
    assert!(matches!(err, HandshakeError::Timeout(_)));
    assert!(joiner.snapshot().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_name_is_refused_at_startup() {
    let result = ProtocolManager::bind(named(&"n".repeat(300))).await;
    assert!(result.is_err());
}
