//! Key-share lookup.

use anchorlog_types::{Address, KeyShare};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of the key shares this node holds.
pub trait KeyShareRegistry: Send + Sync {
    /// Key share for the committee controlling `address`.
    ///
    /// `None` means this node holds no share for that committee.
    fn load_key_share(&self, address: &Address) -> Option<KeyShare>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct StaticKeyShareRegistry {
    shares: RwLock<HashMap<Address, KeyShare>>,
}

impl StaticKeyShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding `shares`.
    pub fn with_shares(shares: impl IntoIterator<Item = KeyShare>) -> Self {
        let registry = Self::new();
        for share in shares {
            registry.insert(share);
        }
        registry
    }

    /// Add or replace a key share (e.g. after a new key generation).
    pub fn insert(&self, share: KeyShare) {
        self.shares.write().insert(*share.address(), share);
    }
}

impl KeyShareRegistry for StaticKeyShareRegistry {
    fn load_key_share(&self, address: &Address) -> Option<KeyShare> {
        self.shares.read().get(address).cloned()
    }
}
