//! # Summary
//!
//! This module defines the `Proposer` struct, which drives one complete
//! Paxos round per call: prepare phase, accept phase, then a best-effort
//! learn broadcast. Failed rounds are retried with exponential backoff up
//! to a fixed attempt ceiling.
//!
//! Concurrent `propose` calls need no coordination between proposers;
//! correctness rests entirely on the acceptors' atomic state handling and
//! on proposal numbers that never collide across replicas.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use log::{debug, info, warn};

use crate::acceptor::Acceptor;
use crate::error::{Error, Phase};
use crate::learner::Learner;
use crate::message::{AcceptReply, Accepted, PrepareReply};
use crate::shared::Shared;

/// Attempts before a proposal is abandoned.
pub const MAX_ATTEMPTS: usize = 3;

/// Backoff before the second attempt; doubles per attempt after that.
const BACKOFF: Duration = Duration::from_millis(500);

/// Majority threshold for a cluster of `cluster` replicas.
pub fn quorum(cluster: usize) -> usize {
    cluster / 2 + 1
}

/// The outcome of a successful round: the proposal number it was decided
/// under, and the value that was actually decided. The decided value is
/// the caller's own unless the round had to adopt a previously accepted
/// foreign value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decided {
    pub number: u64,
    pub value: String,
}

/// Strictly increasing, collision-free proposal numbers: seeded with the
/// replica id and advanced by the cluster size, so two replicas can never
/// generate the same number.
pub struct Generator {
    next: AtomicU64,
    stride: u64,
}

impl Generator {
    pub fn new(id: usize, cluster: usize) -> Self {
        Generator {
            next: AtomicU64::new(id as u64),
            stride: cluster as u64,
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(self.stride, Ordering::Relaxed) + self.stride
    }
}

/// Drives Paxos rounds against the local acceptor/learner and the peer set.
pub struct Proposer {
    quorum: usize,
    generator: Generator,
    acceptor: Arc<Acceptor>,
    learner: Arc<Learner>,
    shared: Shared,
}

impl Proposer {
    pub fn new(
        id: usize,
        cluster: usize,
        acceptor: Arc<Acceptor>,
        learner: Arc<Learner>,
        shared: Shared,
    ) -> Self {
        Proposer {
            quorum: quorum(cluster),
            generator: Generator::new(id, cluster),
            acceptor,
            learner,
            shared,
        }
    }

    /// Runs rounds until one is decided or the attempt budget is spent.
    pub async fn propose(&self, value: &str) -> Result<Decided, Error> {
        let mut backoff = BACKOFF;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(value).await {
            | Ok(decided) => return Ok(decided),
            | Err(error) => warn!("proposal attempt {} failed: {}", attempt, error),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        Err(Error::Exhausted(MAX_ATTEMPTS))
    }

    /// One full prepare/accept/learn round under a fresh proposal number.
    async fn attempt(&self, value: &str) -> Result<Decided, Error> {
        let number = self.generator.next();
        let peers = self.shared.peers();
        info!(
            "starting proposal {} ({} peers, quorum {})",
            number,
            peers.len(),
            self.quorum,
        );

        // Prepare phase: count promises from peers and the local acceptor,
        // remembering the highest-numbered value any of them has accepted.
        let mut promises = 0;
        let mut adopted: Option<Accepted> = None;

        let replies = future::join_all(
            peers.iter().map(|peer| peer.prepare(number)),
        ).await;
        for reply in replies {
            match reply {
            | Ok(PrepareReply::Promise { accepted }) => {
                promises += 1;
                adopt(&mut adopted, accepted);
            }
            | Ok(reply) => debug!("prepare {} answered {}", number, reply),
            | Err(error) => debug!("peer did not vote in prepare: {}", error),
            }
        }
        if let PrepareReply::Promise { accepted } = self.acceptor.prepare(number) {
            promises += 1;
            adopt(&mut adopted, accepted);
        }

        if promises < self.quorum {
            return Err(Error::Quorum {
                phase: Phase::Prepare,
                votes: promises,
                needed: self.quorum,
            });
        }

        // An already-accepted value must win over our own.
        let proposal = match adopted {
        | Some(accepted) => {
            info!(
                "proposal {} adopting value accepted at {}: {:?}",
                number, accepted.number, accepted.value,
            );
            accepted.value
        }
        | None => value.to_string(),
        };

        // Accept phase.
        let mut accepts = 0;
        let replies = future::join_all(
            peers.iter().map(|peer| peer.accept(number, &proposal)),
        ).await;
        for reply in replies {
            match reply {
            | Ok(AcceptReply::Accepted) => accepts += 1,
            | Ok(AcceptReply::Reject) => debug!("accept {} rejected", number),
            | Err(error) => debug!("peer did not vote in accept: {}", error),
            }
        }
        if let AcceptReply::Accepted = self.acceptor.accept(number, &proposal) {
            accepts += 1;
        }

        if accepts < self.quorum {
            return Err(Error::Quorum {
                phase: Phase::Accept,
                votes: accepts,
                needed: self.quorum,
            });
        }

        // Learn broadcast: best effort. A peer that misses it simply lags;
        // it never fails the round.
        let notified = future::join_all(
            peers.iter().map(|peer| peer.learn(number, &proposal)),
        ).await;
        for (peer, result) in peers.iter().zip(notified) {
            if let Err(error) = result {
                warn!("failed to notify learner on peer {}: {}", peer.id(), error);
            }
        }
        self.learner.learn(number, &proposal);

        info!("proposal {} decided on {:?}", number, proposal);
        Ok(Decided { number, value: proposal })
    }
}

/// Keeps the highest-numbered accepted value seen so far.
fn adopt(adopted: &mut Option<Accepted>, accepted: Option<Accepted>) {
    if let Some(accepted) = accepted {
        if adopted.as_ref().map_or(true, |previous| accepted.number > previous.number) {
            *adopted = Some(accepted);
        }
    }
}
