//! # Summary
//!
//! Chaos hook: an optional background task that knocks a replica's
//! acceptor offline at random and brings it back with empty state, the
//! way a crashed-and-restarted acceptor would come back. Nothing in the
//! request path knows this module exists; it has to be enabled
//! explicitly. Defaults: a 1% chance per 100ms tick of starting a
//! 5 second outage.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;

use crate::acceptor::Acceptor;

/// Periodically takes the acceptor offline for a bounded interval, then
/// resets it to empty state and brings it back.
pub struct Injector {
    acceptor: Arc<Acceptor>,
    probability: f64,
    tick: Duration,
    outage: Duration,
}

impl Injector {
    pub fn new(acceptor: Arc<Acceptor>) -> Self {
        Injector {
            acceptor,
            probability: 0.01,
            tick: Duration::from_millis(100),
            outage: Duration::from_secs(5),
        }
    }

    /// Chance per tick of starting an outage. Clamped to [0, 1].
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability.max(0.0).min(1.0);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_outage(mut self, outage: Duration) -> Self {
        self.outage = outage;
        self
    }

    /// Spawns the injector loop. Aborting the returned handle stops it;
    /// the acceptor is left in whatever state the last outage left it.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.tick).await;
                if rand::thread_rng().gen_bool(self.probability) {
                    warn!("fault injector taking acceptor offline for {:?}", self.outage);
                    self.acceptor.set_online(false);
                    tokio::time::sleep(self.outage).await;
                    self.acceptor.reset();
                    self.acceptor.set_online(true);
                    info!("acceptor back online with empty state");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PrepareReply;

    #[tokio::test(start_paused = true)]
    async fn outage_resets_acceptor_state() {
        let acceptor = Arc::new(Acceptor::new());
        acceptor.prepare(5);
        acceptor.accept(5, "PUT k v");

        let injector = Injector::new(acceptor.clone())
            .with_probability(1.0)
            .with_tick(Duration::from_millis(100))
            .with_outage(Duration::from_secs(5));
        let handle = injector.spawn();

        // First tick fires the outage immediately under paused time.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!acceptor.is_online());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(acceptor.is_online());
        handle.abort();

        // Replacement acceptor starts from scratch.
        assert_eq!(
            acceptor.prepare(1),
            PrepareReply::Promise { accepted: None },
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_probability_never_fires() {
        let acceptor = Arc::new(Acceptor::new());
        let handle = Injector::new(acceptor.clone())
            .with_probability(0.0)
            .spawn();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(acceptor.is_online());
        handle.abort();
    }
}
