//! # Summary
//!
//! This module implements a central hub for the peer handles one replica
//! holds. We wrap the peer map with Arc<RwLock<T>> to share it between
//! the proposer, the bootstrap code, and the connectivity check.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use parking_lot::RwLock;

use crate::peer::Peer;

/// Thread-safe, cheaply cloneable peer registry.
#[derive(Clone)]
pub struct Shared(Arc<RwLock<State>>);

struct State {
    id: usize,
    peers: Map<usize, Peer>,
}

impl Shared {
    pub fn new(id: usize) -> Self {
        Shared(Arc::new(RwLock::new(State {
            id,
            peers: Map::new(),
        })))
    }

    /// Registers the provided peer handle with this hub.
    /// The local replica never registers itself.
    pub fn connect_peer(&self, peer: Peer) {
        let mut state = self.0.write();
        debug_assert!(peer.id() != state.id);
        state.peers.insert(peer.id(), peer);
    }

    /// Disconnects the provided peer from this hub.
    pub fn disconnect_peer(&self, id: usize) {
        self.0.write().peers.remove(&id);
    }

    /// Snapshot of the current working peer set.
    pub fn peers(&self) -> Vec<Peer> {
        self.0.read().peers.values().cloned().collect()
    }

    /// Number of peers currently registered (excluding self).
    pub fn len(&self) -> usize {
        self.0.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().peers.is_empty()
    }
}
