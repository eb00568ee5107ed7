//! # Summary
//!
//! This module defines the `Learner` struct, which tallies `learn`
//! notifications per `(proposal number, value)` cell and detects when a
//! cell has gathered a majority of votes.
//!
//! Waiters are woken through a `Notify` on every new vote instead of the
//! coarse 100ms poll the protocol only strictly requires; the bounded-wait
//! contract (10 seconds, then give up) is unchanged.

use hashbrown::HashMap as Map;
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// How long a caller is willing to wait for quorum detection.
pub const CONSENSUS_WAIT: std::time::Duration = std::time::Duration::from_secs(10);

/// Tallies `learn` votes and answers "has any value under this proposal
/// number reached quorum yet?". One per replica.
pub struct Learner {
    quorum: usize,
    tally: Mutex<Map<u64, Map<String, usize>>>,
    notify: Notify,
}

impl Learner {
    pub fn new(quorum: usize) -> Self {
        Learner {
            quorum,
            tally: Mutex::new(Map::new()),
            notify: Notify::new(),
        }
    }

    /// Records one vote for `(number, value)` and wakes any waiters.
    ///
    /// Returns true exactly when this vote is the one that reaches the
    /// quorum threshold, so a caller can apply the decided value once.
    /// Redundant deliveries keep counting past the threshold; that
    /// over-count is harmless because every check is `>= quorum`.
    pub fn learn(&self, number: u64, value: &str) -> bool {
        let mut tally = self.tally.lock();
        let count = tally
            .entry(number)
            .or_default()
            .entry(value.to_string())
            .or_insert(0);
        *count += 1;
        let decided = *count == self.quorum;
        trace!("vote {} of {} for ({}, {:?})", count, self.quorum, number, value);
        drop(tally);
        self.notify.notify_waiters();
        decided
    }

    /// The value decided under `number`, if any has reached quorum.
    pub fn decided(&self, number: u64) -> Option<String> {
        self.tally
            .lock()
            .get(&number)
            .and_then(|votes| {
                votes
                    .iter()
                    .find(|(_, count)| **count >= self.quorum)
                    .map(|(value, _)| value.clone())
            })
    }

    /// Blocks until some value under `number` reaches quorum, or until the
    /// wait window expires. Returns whether consensus was observed.
    pub async fn wait_for_consensus(&self, number: u64) -> bool {
        let deadline = tokio::time::Instant::now() + CONSENSUS_WAIT;
        loop {
            // Register before checking so a vote landing between the check
            // and the await still wakes us.
            let notified = self.notify.notified();
            if self.decided(number).is_some() {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!("gave up waiting for consensus on proposal {}", number);
                return self.decided(number).is_some();
            }
        }
    }
}
