//! # Summary
//!
//! This module defines the `Acceptor` struct, which acts as Paxos's
//! distributed memory. An acceptor remembers the highest proposal number
//! it has promised and the highest-numbered value it has accepted, and
//! an accepted value is never forgotten while the acceptor is alive.
//!
//! State lives only for the process lifetime; a restarted acceptor comes
//! back empty. The fault injector in `fault` leans on this to model a
//! crashed acceptor being replaced by a fresh one.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::message::{AcceptReply, Accepted, PrepareReply};

/// Functions as distributed memory. One per replica.
pub struct Acceptor {
    state: Mutex<State>,
    online: AtomicBool,
}

/// Acceptors keep track of the highest proposal number they have promised,
/// and the highest-numbered value they have accepted.
#[derive(Default)]
struct State {
    promised: Option<u64>,
    accepted: Option<Accepted>,
}

impl Acceptor {
    pub fn new() -> Self {
        Acceptor {
            state: Mutex::new(State::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Phase one: promise to ignore proposals below `number`, reporting the
    /// previously accepted value if there is one. The whole read-modify-write
    /// is a single atomic step with respect to this acceptor.
    pub fn prepare(&self, number: u64) -> PrepareReply {
        let mut state = self.state.lock();
        if state.promised.map_or(true, |promised| number > promised) {
            state.promised = Some(number);
            trace!("promised proposal {}", number);
            PrepareReply::Promise { accepted: state.accepted.clone() }
        } else {
            trace!("rejected prepare {} (promised {:?})", number, state.promised);
            PrepareReply::Reject
        }
    }

    /// Phase two: accept `value` under `number` unless a higher-numbered
    /// proposal has been promised in the meantime. Atomic per acceptor.
    pub fn accept(&self, number: u64, value: &str) -> AcceptReply {
        let mut state = self.state.lock();
        if state.promised.map_or(true, |promised| number >= promised) {
            state.promised = Some(number);
            state.accepted = Some(Accepted {
                number,
                value: value.to_string(),
            });
            trace!("accepted proposal {}", number);
            AcceptReply::Accepted
        } else {
            trace!("rejected accept {} (promised {:?})", number, state.promised);
            AcceptReply::Reject
        }
    }

    /// Forgets all voting state, as if a fresh acceptor replaced this one.
    /// Only the fault injector calls this.
    pub fn reset(&self) {
        *self.state.lock() = State::default();
        debug!("acceptor state reset");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for Acceptor {
    fn default() -> Self {
        Acceptor::new()
    }
}
