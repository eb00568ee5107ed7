use thiserror::Error;

/// Paxos phase that failed to gather a quorum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Accept,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | Phase::Prepare => write!(fmt, "prepare"),
        | Phase::Accept => write!(fmt, "accept"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// The peer's connection task is gone: connection refused at startup,
    /// dropped mid-flight, or the process is unreachable.
    #[error("peer {0} is unreachable")]
    Unreachable(usize),

    /// The peer did not answer within the RPC deadline.
    #[error("peer {0} timed out")]
    Timeout(usize),

    /// The peer answered with a reply that doesn't match the request.
    #[error("unexpected reply from peer {0}")]
    Protocol(usize),

    #[error("{phase} phase quorum not reached: {votes} of {needed} votes")]
    Quorum {
        phase: Phase,
        votes: usize,
        needed: usize,
    },

    #[error("proposal abandoned after {0} attempts")]
    Exhausted(usize),

    #[error("malformed command: {0:?}")]
    MalformedCommand(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
