//! A replicated key-value store whose writes are ordered by single-decree
//! Paxos among a fixed set of replicas. Each replica owns an acceptor, a
//! proposer, and a learner; a write is applied to the local map only after
//! its command has been accepted by a majority of the cluster.

mod acceptor;
mod command;
mod config;
mod error;
mod fault;
mod learner;
mod message;
mod peer;
mod proposer;
mod replica;
mod shared;
mod socket;
mod store;

pub use crate::acceptor::Acceptor;
pub use crate::command::Command;
pub use crate::config::Config;
pub use crate::error::{Error, Phase};
pub use crate::fault::Injector;
pub use crate::learner::{Learner, CONSENSUS_WAIT};
pub use crate::message::{
    AcceptReply, Accepted, ClientRequest, ClientResponse, PrepareReply, Request, Response,
};
pub use crate::peer::{Call, Peer, RPC_TIMEOUT};
pub use crate::proposer::{quorum, Decided, Generator, Proposer, MAX_ATTEMPTS};
pub use crate::replica::{Replica, PREPARE_TIMEOUT};
pub use crate::shared::Shared;
pub use crate::store::Store;

pub mod external {
    //! Framed transport for external callers (the client binary).
    pub use crate::socket::{split, Rx, Tx};
}
