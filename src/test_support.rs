#[cfg(test)]
pub mod test_support {
    use crate::core::identifier::{NodeID, NodeInfo};
    use ethereum_types::H160;
    use std::net::Ipv4Addr;

    pub fn id_with_first_byte(b: u8) -> NodeID {
        let mut id = [0u8; 20];
        id[0] = b;
        NodeID(H160::from(id))
    }

    /// Identifier whose low 64 bits hold `v`, e.g. `id_from_u64(1)` is `0x00…01`.
    pub fn id_from_u64(v: u64) -> NodeID {
        let mut id = [0u8; 20];
        id[12..].copy_from_slice(&v.to_be_bytes());
        NodeID(H160::from(id))
    }

    pub fn make_peer(last_octet: u8, port: u16, node_id: NodeID) -> NodeInfo {
        NodeInfo {
            ip_address: Ipv4Addr::new(127, 0, 0, last_octet),
            tcp_port: port,
            node_id,
        }
    }

    pub fn endpoint(last_octet: u8, port: u16) -> NodeInfo {
        NodeInfo::from_endpoint(Ipv4Addr::new(10, 0, 0, last_octet), port)
    }
}
