use serde::Serialize;

use super::identifier::{NodeID, NodeInfo, ID_BITS};

/// Number of buckets in the table, one per possible common-prefix length.
pub const NUM_BUCKETS: usize = ID_BITS;

/// What `RoutingTable::insert` did with the offered contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertOutcome {
    Inserted { slot: usize },                       // bucket was empty
    Refreshed { slot: usize },                      // same node_id re-announced, contact overwritten
    Replaced { slot: usize, evicted: NodeInfo },    // new contact is strictly closer than the occupant
    Kept { slot: usize, occupant: NodeInfo },       // occupant is at least as close, new contact dropped
    SelfIgnored,                                    // never add ourselves
}

impl InsertOutcome {
    pub fn slot(&self) -> Option<usize> {
        match *self {
            InsertOutcome::Inserted { slot }
            | InsertOutcome::Refreshed { slot }
            | InsertOutcome::Replaced { slot, .. }
            | InsertOutcome::Kept { slot, .. } => Some(slot),
            InsertOutcome::SelfIgnored => None,
        }
    }

    /// True when a different contact was pushed out of its bucket.
    pub fn replaced(&self) -> bool {
        matches!(self, InsertOutcome::Replaced { .. })
    }

    /// True when the table now holds the offered contact.
    pub fn stored(&self) -> bool {
        matches!(
            self,
            InsertOutcome::Inserted { .. }
                | InsertOutcome::Refreshed { .. }
                | InsertOutcome::Replaced { .. }
        )
    }
}

/// One occupied bucket, as reported by `RoutingTable::snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub slot: usize,
    pub contact: NodeInfo,
}

/// Routing table with one single-capacity bucket per common-prefix length.
///
/// Bucket `i` holds a contact whose id shares exactly `i` leading bits with
/// `my_id`. When two contacts compete for a bucket, the one with the smaller
/// XOR distance to `my_id` wins.
#[derive(Debug)]
pub struct RoutingTable {
    my_id: NodeID,
    buckets: Vec<Option<NodeInfo>>,
}

impl RoutingTable {
    pub fn new(my_id: NodeID) -> Self {
        Self {
            my_id,
            buckets: vec![None; NUM_BUCKETS],
        }
    }

    /// Bucket index for `id`. `None` for our own id, which has no bucket.
    pub fn bucket_index(&self, id: &NodeID) -> Option<usize> {
        let cpl = self.my_id.common_prefix_len(id);
        (cpl < NUM_BUCKETS).then_some(cpl)
    }

    pub fn insert(&mut self, peer: NodeInfo) -> InsertOutcome {
        let Some(slot) = self.bucket_index(&peer.node_id) else {
            return InsertOutcome::SelfIgnored;
        };

        let bucket = &mut self.buckets[slot];
        match *bucket {
            None => {
                *bucket = Some(peer);
                InsertOutcome::Inserted { slot }
            }
            Some(existing) if existing.node_id == peer.node_id => {
                *bucket = Some(peer);
                InsertOutcome::Refreshed { slot }
            }
            Some(existing) => {
                let existing_dist = self.my_id.distance(&existing.node_id);
                let new_dist = self.my_id.distance(&peer.node_id);
                if new_dist < existing_dist {
                    *bucket = Some(peer);
                    InsertOutcome::Replaced {
                        slot,
                        evicted: existing,
                    }
                } else {
                    InsertOutcome::Kept {
                        slot,
                        occupant: existing,
                    }
                }
            }
        }
    }

    pub fn slot(&self, index: usize) -> Option<&NodeInfo> {
        self.buckets.get(index).and_then(Option::as_ref)
    }

    pub fn find(&self, node_id: NodeID) -> Option<&NodeInfo> {
        self.bucket_index(&node_id)
            .and_then(|i| self.slot(i))
            .filter(|n| n.node_id == node_id)
    }

    pub fn contains(&self, node_id: NodeID) -> bool {
        self.find(node_id).is_some()
    }

    /// All stored contacts in ascending bucket order, optionally leaving out one id.
    pub fn known_contacts(&self, excluding: Option<NodeID>) -> Vec<NodeInfo> {
        self.buckets
            .iter()
            .flatten()
            .filter(|n| Some(n.node_id) != excluding)
            .copied()
            .collect()
    }

    /// Number of occupied buckets.
    pub fn size(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Owned copy of the occupied buckets, detached from the table.
    pub fn snapshot(&self) -> Vec<SlotEntry> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(slot, b)| b.map(|contact| SlotEntry { slot, contact }))
            .collect()
    }
}
