//! Committee membership as seen by one node.

use crate::{Address, CommitteeId, NodeId};

/// Key share held by this node for one committee.
///
/// Only the membership is modelled; the threshold key material lives with the
/// key-share store outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShare {
    address: Address,
    committee_id: CommitteeId,
    /// Ordered committee members.
    members: Vec<NodeId>,
}

impl KeyShare {
    /// Create a key share for the committee controlling `address`.
    ///
    /// Duplicate members are dropped, keeping the first occurrence.
    pub fn new(address: Address, members: Vec<NodeId>) -> Self {
        let mut unique = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        Self {
            address,
            committee_id: CommitteeId::from_address(&address),
            members: unique,
        }
    }

    /// Controlling address of the committee.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn committee_id(&self) -> CommitteeId {
        self.committee_id
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Committee size `n`.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_share_membership() {
        let share = KeyShare::new(
            Address([7; 32]),
            vec![NodeId(3), NodeId(1), NodeId(3), NodeId(2)],
        );
        assert_eq!(share.size(), 3);
        assert_eq!(share.members(), &[NodeId(3), NodeId(1), NodeId(2)]);
        assert!(share.contains(NodeId(2)));
        assert!(!share.contains(NodeId(9)));
        assert_eq!(
            share.committee_id(),
            CommitteeId::from_address(&Address([7; 32]))
        );
    }
}
