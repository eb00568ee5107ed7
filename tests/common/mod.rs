use std::sync::Arc;
use std::time::Duration;

use paxos_kv::{ClientResponse, Peer, Replica};

/// Builds a fully meshed in-process cluster of `n` replicas, wired over
/// channel transports instead of TCP.
pub fn cluster(n: usize) -> Vec<Arc<Replica>> {
    let replicas = (0..n).map(|id| Replica::new(id, n)).collect::<Vec<_>>();
    for replica in &replicas {
        for peer in &replicas {
            if peer.id() != replica.id() {
                replica.shared().connect_peer(Peer::local(peer.clone()));
            }
        }
    }
    replicas
}

/// Makes replica `id` unreachable from every other replica: each of their
/// handles to it is replaced with one whose transport is gone, so calls
/// fail immediately.
pub fn take_down(replicas: &[Arc<Replica>], id: usize) {
    for replica in replicas {
        if replica.id() != id {
            let (dead, rx) = Peer::channel(id);
            drop(rx);
            replica.shared().connect_peer(dead);
        }
    }
}

/// Polls until `replica.get(key)` matches `expect`, or a bounded wait
/// expires. Covers the window where learn fan-out is still in flight.
pub async fn eventually(replica: &Replica, key: &str, expect: &ClientResponse) {
    for _ in 0..100 {
        if replica.get(key) == *expect {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(replica.get(key), *expect, "replica {} never converged", replica.id());
}
