//! # Summary
//!
//! This module binds the three Paxos roles and the key-value store into a
//! single replica. Writes are gated on consensus: a `put` or `delete`
//! proposes the command, waits for the local learner to observe quorum,
//! and only then applies the decided value. Reads are served straight
//! from the local store, so a replica may answer with a value that a
//! write still in flight elsewhere has not yet replaced.
//!
//! The same struct is the RPC surface peers talk to: `prepare`, `accept`,
//! `learn`, and `ping` delegate to the owned acceptor and learner.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use log::{debug, error, info, warn};
use tokio::net::TcpStream;

use crate::acceptor::Acceptor;
use crate::command::Command;
use crate::error::Error;
use crate::learner::Learner;
use crate::message::{
    AcceptReply, ClientRequest, ClientResponse, PrepareReply, Request, Response,
};
use crate::proposer::{quorum, Proposer};
use crate::shared::Shared;
use crate::socket;
use crate::store::Store;

/// Deadline on the `prepare` RPC entry point. A prepare that cannot
/// complete in time answers `TIMEOUT` instead of hanging the caller.
pub const PREPARE_TIMEOUT: Duration = Duration::from_secs(5);

/// One member of the cluster: acceptor, proposer, learner, and the local
/// key-value map, behind a single RPC surface.
pub struct Replica {
    id: usize,
    store: Store,
    acceptor: Arc<Acceptor>,
    learner: Arc<Learner>,
    proposer: Proposer,
    shared: Shared,
}

impl Replica {
    /// Creates a replica for a cluster of `cluster` members total. Peers
    /// are registered separately through the shared hub.
    pub fn new(id: usize, cluster: usize) -> Arc<Self> {
        let shared = Shared::new(id);
        let acceptor = Arc::new(Acceptor::new());
        let learner = Arc::new(Learner::new(quorum(cluster)));
        let proposer = Proposer::new(
            id,
            cluster,
            acceptor.clone(),
            learner.clone(),
            shared.clone(),
        );
        Arc::new(Replica {
            id,
            store: Store::new(),
            acceptor,
            learner,
            proposer,
            shared,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    /// The owned acceptor, exposed for the fault injector.
    pub fn acceptor(&self) -> &Arc<Acceptor> {
        &self.acceptor
    }

    /// Write routed through consensus.
    pub async fn put(&self, key: &str, value: &str) -> ClientResponse {
        let command = Command::Put {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.run_paxos(command.to_string()).await
    }

    /// Delete routed through consensus.
    pub async fn delete(&self, key: &str) -> ClientResponse {
        let command = Command::Delete { key: key.to_string() };
        self.run_paxos(command.to_string()).await
    }

    /// Local read, intentionally not routed through consensus.
    pub fn get(&self, key: &str) -> ClientResponse {
        match self.store.get(key) {
        | Some(value) => ClientResponse::Value(value),
        | None => ClientResponse::NotFound,
        }
    }

    pub fn get_all(&self) -> ClientResponse {
        ClientResponse::Listing(self.store.snapshot())
    }

    /// Proposes `command`, waits for the learner to observe quorum, and
    /// applies the decided value. Every failure is converted into a result
    /// here; nothing propagates to the caller as a fault.
    async fn run_paxos(&self, command: String) -> ClientResponse {
        match self.proposer.propose(&command).await {
        | Ok(decided) => {
            if !self.learner.wait_for_consensus(decided.number).await {
                return ClientResponse::NoConsensus;
            }
            // Apply the *decided* value: if the round adopted a foreign
            // value, that is what the cluster agreed on, not `command`.
            match self.apply(&decided.value) {
            | Ok(()) => ClientResponse::Success,
            | Err(error) => {
                error!("decided value failed to apply: {}", error);
                ClientResponse::Error(error.to_string())
            }
            }
        }
        | Err(error) => {
            error!("paxos round failed: {}", error);
            ClientResponse::Error(error.to_string())
        }
        }
    }

    fn apply(&self, value: &str) -> Result<(), Error> {
        let command = value.parse::<Command>()?;
        self.store.apply(&command);
        Ok(())
    }

    /// RPC entry point for the prepare phase, with a hard deadline.
    ///
    /// The acceptor itself answers immediately; the deadline matters when
    /// the fault injector has taken it offline, in which case the call
    /// pends until the timeout fires and reports `TIMEOUT`.
    pub async fn prepare(&self, number: u64) -> PrepareReply {
        let acceptor = self.acceptor.clone();
        let prepare = async move {
            if !acceptor.is_online() {
                futures::future::pending::<()>().await;
            }
            acceptor.prepare(number)
        };
        match tokio::time::timeout(PREPARE_TIMEOUT, prepare).await {
        | Ok(reply) => reply,
        | Err(_) => {
            warn!("prepare {} timed out", number);
            PrepareReply::Timeout
        }
        }
    }

    /// RPC entry point for the accept phase.
    ///
    /// An accepted vote is fanned out as a `learn` to every learner in the
    /// cluster, ours included. Each replica's tally therefore counts one
    /// vote per accepting acceptor, and crosses the majority threshold
    /// exactly when a quorum has accepted.
    pub fn accept(&self, number: u64, value: &str) -> AcceptReply {
        if !self.acceptor.is_online() {
            return AcceptReply::Reject;
        }
        let reply = self.acceptor.accept(number, value);
        if let AcceptReply::Accepted = reply {
            self.learn(number, value);
            let peers = self.shared.peers();
            let value = value.to_string();
            tokio::spawn(async move {
                let notified = future::join_all(
                    peers.iter().map(|peer| peer.learn(number, &value)),
                ).await;
                for (peer, result) in peers.iter().zip(notified) {
                    if let Err(error) = result {
                        debug!("failed to relay vote to peer {}: {}", peer.id(), error);
                    }
                }
            });
        }
        reply
    }

    /// RPC entry point for learn notifications. When this vote is the one
    /// that completes a quorum, the decided value is applied to the local
    /// store, which is how non-proposing replicas converge.
    pub fn learn(&self, number: u64, value: &str) {
        if self.learner.learn(number, value) {
            if let Err(error) = self.apply(value) {
                error!("decided value failed to apply: {}", error);
            }
        }
    }

    /// Dispatches one inbound peer request.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
        | Request::Prepare(number) => Response::Prepare(self.prepare(number).await),
        | Request::Accept(number, value) => Response::Accept(self.accept(number, &value)),
        | Request::Learn(number, value) => {
            self.learn(number, &value);
            Response::Learn
        }
        | Request::Ping => Response::Pong(self.id),
        }
    }

    /// Dispatches one inbound client request.
    pub async fn handle_client(&self, request: ClientRequest) -> ClientResponse {
        debug!("client request {:?}", request);
        match request {
        | ClientRequest::Put { key, value } => self.put(&key, &value).await,
        | ClientRequest::Get { key } => self.get(&key),
        | ClientRequest::Delete { key } => self.delete(&key).await,
        | ClientRequest::GetAll => self.get_all(),
        }
    }

    /// Serves one client connection over the framed socket. Requests on a
    /// single connection are answered in order.
    pub async fn serve_client(self: Arc<Self>, stream: TcpStream) {
        let (mut rx, mut tx) = socket::split::<ClientRequest, ClientResponse>(stream);
        while let Some(frame) = rx.recv().await {
            match frame {
            | Ok(request) => {
                let response = self.handle_client(request).await;
                if let Err(error) = tx.send(&response).await {
                    warn!("failed to answer client: {}", error);
                    break;
                }
            }
            | Err(error) => {
                warn!("failed to read client request: {}", error);
                break;
            }
            }
        }
        debug!("client disconnected");
    }

    /// Pings every working peer and logs the result. Failures are logged
    /// and otherwise ignored.
    pub async fn check_connectivity(&self) {
        info!("checking connectivity with {} peers", self.shared.len());
        for peer in self.shared.peers() {
            match peer.ping().await {
            | Ok(id) => info!("pong from {}", id),
            | Err(error) => warn!("failed to ping peer {}: {}", peer.id(), error),
            }
        }
    }
}
