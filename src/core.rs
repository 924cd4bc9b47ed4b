use std::net::SocketAddrV4;

pub mod identifier;
pub mod routing_table;

use identifier::{NodeID, NodeInfo};
use routing_table::RoutingTable;

/// Everything a running node knows: who it is and who it has met.
#[derive(Debug)]
pub struct NodeState {
    pub my_info: NodeInfo,
    pub name: String,
    pub routing_table: RoutingTable,
}

impl NodeState {
    /// Fresh state for the node listening at `addr`. Any earlier table is discarded.
    pub fn new(addr: SocketAddrV4, name: impl Into<String>) -> Self {
        let my_info = NodeInfo::from_endpoint(*addr.ip(), addr.port());

        Self {
            my_info,
            name: name.into(),
            routing_table: RoutingTable::new(my_info.node_id),
        }
    }

    pub fn node_id(&self) -> NodeID {
        self.my_info.node_id
    }
}
