//! # Summary
//!
//! This module abstracts over connections to peer replicas. A `Peer` is a
//! cheaply cloneable handle whose calls are forwarded over an unbounded
//! channel to a connection task; request/response pairs are matched up by
//! sequence number so several proposals can be in flight on one socket.
//!
//! Because the handle is just a channel, the transport behind it is
//! interchangeable: `Peer::connect` backs it with the bincode TCP framing
//! from `socket`, while `Peer::local` services calls against an in-process
//! replica, which is how the integration tests wire up whole clusters
//! without touching the network.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap as Map;
use log::{info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::message::{AcceptReply, PrepareReply, Request, Response};
use crate::replica::Replica;
use crate::socket;

/// How long one remote call may take before the peer is counted as absent.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// One in-flight request: the message and the channel its answer goes to.
pub type Call = (Request, oneshot::Sender<Response>);

/// Handle to a single peer replica.
#[derive(Clone)]
pub struct Peer {
    id: usize,
    tx: mpsc::UnboundedSender<Call>,
}

impl Peer {
    /// Raw constructor: a handle plus the receiving end its calls arrive
    /// on. Whatever services the receiver is the transport.
    pub fn channel(id: usize) -> (Self, mpsc::UnboundedReceiver<Call>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Peer { id, tx }, rx)
    }

    /// Connects to the peer listening at `addr` and spawns the connection
    /// task that owns the socket.
    pub async fn connect(id: usize, addr: SocketAddr) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).await?;
        let (peer, rx) = Peer::channel(id);
        tokio::spawn(run(id, stream, rx));
        info!("connected to peer {} at {}", id, addr);
        Ok(peer)
    }

    /// Backs the handle with an in-process replica instead of a socket.
    pub fn local(replica: Arc<Replica>) -> Self {
        let (peer, mut rx) = Peer::channel(replica.id());
        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                // One task per request so a slow prepare cannot hold up
                // the rest of the queue.
                let replica = replica.clone();
                tokio::spawn(async move {
                    let _ = reply.send(replica.handle(request).await);
                });
            }
        });
        peer
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub async fn prepare(&self, number: u64) -> Result<PrepareReply, Error> {
        match self.call(Request::Prepare(number)).await? {
        | Response::Prepare(reply) => Ok(reply),
        | _ => Err(Error::Protocol(self.id)),
        }
    }

    pub async fn accept(&self, number: u64, value: &str) -> Result<AcceptReply, Error> {
        match self.call(Request::Accept(number, value.to_string())).await? {
        | Response::Accept(reply) => Ok(reply),
        | _ => Err(Error::Protocol(self.id)),
        }
    }

    pub async fn learn(&self, number: u64, value: &str) -> Result<(), Error> {
        match self.call(Request::Learn(number, value.to_string())).await? {
        | Response::Learn => Ok(()),
        | _ => Err(Error::Protocol(self.id)),
        }
    }

    pub async fn ping(&self) -> Result<usize, Error> {
        match self.call(Request::Ping).await? {
        | Response::Pong(id) => Ok(id),
        | _ => Err(Error::Protocol(self.id)),
        }
    }

    async fn call(&self, request: Request) -> Result<Response, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .map_err(|_| Error::Unreachable(self.id))?;
        match tokio::time::timeout(RPC_TIMEOUT, reply_rx).await {
        | Ok(Ok(response)) => Ok(response),
        | Ok(Err(_)) => Err(Error::Unreachable(self.id)),
        | Err(_) => Err(Error::Timeout(self.id)),
        }
    }
}

/// Connection task: forwards calls over the socket and routes responses
/// back to their callers by sequence number.
async fn run(id: usize, stream: TcpStream, mut calls: mpsc::UnboundedReceiver<Call>) {
    let (mut rx, mut tx) = socket::split::<(u64, Response), (u64, Request)>(stream);
    let mut pending: Map<u64, oneshot::Sender<Response>> = Map::new();
    let mut seq = 0u64;
    loop {
        tokio::select! {
            call = calls.recv() => match call {
            | Some((request, reply)) => {
                seq += 1;
                trace!("sending {:?} to peer {} as {}", request, id, seq);
                if let Err(error) = tx.send(&(seq, request)).await {
                    warn!("failed to send to peer {}: {}", id, error);
                    break;
                }
                pending.insert(seq, reply);
            }
            // All handles dropped.
            | None => break,
            },
            frame = rx.recv() => match frame {
            | Some(Ok((seq, response))) => {
                trace!("received {:?} from peer {} for {}", response, id, seq);
                // Caller may have timed out and dropped its receiver.
                if let Some(reply) = pending.remove(&seq) {
                    reply.send(response).ok();
                }
            }
            | Some(Err(error)) => {
                warn!("failed to read from peer {}: {}", id, error);
                break;
            }
            | None => {
                info!("disconnected from peer {}", id);
                break;
            }
            },
        }
    }
    // Dropping `pending` fails any in-flight calls with Unreachable.
}

/// Serves one inbound peer connection, answering each framed request with
/// the matching framed response. Requests are handled on their own tasks
/// so one slow prepare cannot stall the connection.
pub async fn serve(replica: Arc<Replica>, stream: TcpStream) {
    let (mut rx, mut tx) = socket::split::<(u64, Request), (u64, Response)>(stream);
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<(u64, Response)>();

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(error) = tx.send(&frame).await {
                warn!("failed to answer peer: {}", error);
                break;
            }
        }
    });

    while let Some(frame) = rx.recv().await {
        match frame {
        | Ok((seq, request)) => {
            let replica = replica.clone();
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let response = replica.handle(request).await;
                out_tx.send((seq, response)).ok();
            });
        }
        | Err(error) => {
            warn!("failed to read inbound peer frame: {}", error);
            break;
        }
        }
    }
}
