//! # Summary
//!
//! Replica bootstrap: bind the peer and client listeners, dial every
//! configured peer (best-effort; an unreachable peer is simply absent
//! from the working peer set), optionally start the fault injector, and
//! finish with a ping-based connectivity check.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::net::TcpListener;

use crate::error::Error;
use crate::fault;
use crate::peer::{self, Peer};
use crate::replica::Replica;

/// Dial attempts per peer at startup; peers that never answer are left
/// out of the working peer set rather than failing the boot.
const CONNECT_ATTEMPTS: usize = 5;
const CONNECT_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct Config {
    /// Unique replica ID; also the index of our own entry in `cluster`.
    id: usize,

    /// Address to serve client requests on.
    client_addr: SocketAddr,

    /// Peer addresses of every cluster member, in replica-ID order.
    /// Our own entry is the address we listen on for peers.
    cluster: Vec<SocketAddr>,

    /// Whether to run the chaos fault injector against our acceptor.
    fault_injection: bool,
}

impl Config {
    pub fn new(id: usize, client_addr: SocketAddr, cluster: Vec<SocketAddr>) -> Self {
        Config {
            id,
            client_addr,
            cluster,
            fault_injection: false,
        }
    }

    pub fn with_fault_injection(mut self, enabled: bool) -> Self {
        self.fault_injection = enabled;
        self
    }

    /// Starts the replica and returns a handle to it once the listeners
    /// are up and the startup peer connections have been attempted.
    pub async fn run(self) -> Result<Arc<Replica>, Error> {
        if self.id >= self.cluster.len() {
            return Err(Error::Config(format!(
                "replica id {} out of range for cluster of {}",
                self.id,
                self.cluster.len(),
            )));
        }

        let replica = Replica::new(self.id, self.cluster.len());

        let peer_listener = TcpListener::bind(self.cluster[self.id]).await?;
        let client_listener = TcpListener::bind(self.client_addr).await?;
        info!(
            "replica {} listening for peers on {} and clients on {}",
            self.id,
            self.cluster[self.id],
            self.client_addr,
        );

        let server = replica.clone();
        tokio::spawn(async move {
            loop {
                match peer_listener.accept().await {
                | Ok((stream, _)) => {
                    tokio::spawn(peer::serve(server.clone(), stream));
                }
                | Err(error) => warn!("failed to accept peer connection: {}", error),
                }
            }
        });

        let server = replica.clone();
        tokio::spawn(async move {
            loop {
                match client_listener.accept().await {
                | Ok((stream, _)) => {
                    tokio::spawn(server.clone().serve_client(stream));
                }
                | Err(error) => warn!("failed to accept client connection: {}", error),
                }
            }
        });

        for (peer_id, addr) in self.cluster.iter().enumerate() {
            if peer_id == self.id {
                continue;
            }
            match connect(peer_id, *addr).await {
            | Ok(peer) => replica.shared().connect_peer(peer),
            | Err(error) => {
                warn!("peer {} unreachable at startup: {}", peer_id, error);
            }
            }
        }

        if self.fault_injection {
            fault::Injector::new(replica.acceptor().clone()).spawn();
        }

        replica.check_connectivity().await;
        info!("replica {} fully initialized and ready", self.id);
        Ok(replica)
    }
}

/// Dials a peer with a few retries to ride out staggered startups.
async fn connect(id: usize, addr: SocketAddr) -> Result<Peer, Error> {
    let mut attempt = 0;
    loop {
        match Peer::connect(id, addr).await {
        | Ok(peer) => return Ok(peer),
        | Err(error) => {
            attempt += 1;
            if attempt == CONNECT_ATTEMPTS {
                return Err(error);
            }
            tokio::time::sleep(CONNECT_DELAY).await;
        }
        }
    }
}
