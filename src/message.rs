//! # Summary
//!
//! This module defines every message that crosses a replica boundary:
//! the peer-to-peer Paxos protocol, and the client-facing request surface.
//!
//! All of these are bincode-encoded over the length-delimited TCP framing
//! in `socket`, but their `Display` implementations render the canonical
//! protocol strings (`PROMISE,<n>,<v>`, `REJECT`, `SUCCESS`, ...) so logs
//! and the interactive client stay readable.

use serde_derive::{Deserialize, Serialize};

/// A `(proposal number, value)` pair recorded by an acceptor.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub number: u64,
    pub value: String,
}

/// Answer to a `prepare` request.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrepareReply {
    /// The acceptor promises not to honor any lower-numbered proposal,
    /// reporting its previously accepted value if it has one.
    Promise { accepted: Option<Accepted> },
    /// A higher-numbered proposal has already been promised.
    Reject,
    /// The acceptor did not answer within the prepare deadline.
    Timeout,
}

/// Answer to an `accept` request.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceptReply {
    Accepted,
    Reject,
}

/// Requests exchanged between replicas.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub enum Request {
    Prepare(u64),
    Accept(u64, String),
    Learn(u64, String),
    Ping,
}

/// Replies exchanged between replicas, one variant per `Request`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub enum Response {
    Prepare(PrepareReply),
    Accept(AcceptReply),
    Learn,
    Pong(usize),
}

/// Requests a client sends to any replica.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub enum ClientRequest {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    GetAll,
}

/// Result of a client request, rendered through `Display` as the
/// protocol strings the store promises to its callers.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientResponse {
    /// The write reached consensus and was applied locally.
    Success,
    /// The proposal was decided but the local learner never observed
    /// a quorum of `learn` notifications within its wait window.
    NoConsensus,
    /// The Paxos round failed outright, or the command was malformed.
    Error(String),
    /// Value found by a `get`.
    Value(String),
    /// `get` on a missing key.
    NotFound,
    /// Full contents of the store.
    Listing(Vec<(String, String)>),
}

impl std::fmt::Display for PrepareReply {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | PrepareReply::Promise { accepted: None } => write!(fmt, "PROMISE"),
        | PrepareReply::Promise { accepted: Some(accepted) } => {
            write!(fmt, "PROMISE,{},{}", accepted.number, accepted.value)
        }
        | PrepareReply::Reject => write!(fmt, "REJECT"),
        | PrepareReply::Timeout => write!(fmt, "TIMEOUT"),
        }
    }
}

impl std::fmt::Display for AcceptReply {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | AcceptReply::Accepted => write!(fmt, "ACCEPTED"),
        | AcceptReply::Reject => write!(fmt, "REJECT"),
        }
    }
}

impl std::fmt::Display for ClientResponse {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | ClientResponse::Success => write!(fmt, "SUCCESS"),
        | ClientResponse::NoConsensus => write!(fmt, "FAILURE: Consensus not reached"),
        | ClientResponse::Error(reason) => write!(fmt, "ERROR: {}", reason),
        | ClientResponse::Value(value) => write!(fmt, "{}", value),
        | ClientResponse::NotFound => write!(fmt, "ERROR: key not found"),
        | ClientResponse::Listing(pairs) => {
            for (key, value) in pairs {
                writeln!(fmt, "{} {}", key, value)?;
            }
            Ok(())
        }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_reply_renders_protocol_strings() {
        let bare = PrepareReply::Promise { accepted: None };
        let carried = PrepareReply::Promise {
            accepted: Some(Accepted { number: 7, value: "PUT k v".to_string() }),
        };
        assert_eq!(bare.to_string(), "PROMISE");
        assert_eq!(carried.to_string(), "PROMISE,7,PUT k v");
        assert_eq!(PrepareReply::Reject.to_string(), "REJECT");
        assert_eq!(PrepareReply::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn client_response_renders_protocol_strings() {
        assert_eq!(ClientResponse::Success.to_string(), "SUCCESS");
        assert_eq!(
            ClientResponse::NoConsensus.to_string(),
            "FAILURE: Consensus not reached",
        );
        assert_eq!(
            ClientResponse::NotFound.to_string(),
            "ERROR: key not found",
        );
        let listing = ClientResponse::Listing(vec![
            ("k1".to_string(), "v1".to_string()),
            ("k2".to_string(), "v2".to_string()),
        ]);
        assert_eq!(listing.to_string(), "k1 v1\nk2 v2\n");
    }
}
