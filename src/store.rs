//! # Summary
//!
//! The replicated key-value map itself. Nothing here knows about Paxos:
//! the replica only calls `apply` after a command has reached consensus,
//! so remote influence on this state is always mediated by the protocol.

use hashbrown::HashMap as Map;
use log::info;
use parking_lot::RwLock;

use crate::command::Command;

/// The externally visible key-value state of one replica.
#[derive(Default)]
pub struct Store {
    map: RwLock<Map<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.read().get(key).cloned()
    }

    /// Applies a decided command. Both operations are idempotent, so a
    /// duplicate apply of the same decision leaves the map unchanged.
    pub fn apply(&self, command: &Command) {
        info!("applying {}", command);
        match command {
        | Command::Put { key, value } => {
            self.map.write().insert(key.clone(), value.clone());
        }
        | Command::Delete { key } => {
            self.map.write().remove(key);
        }
        }
    }

    /// All pairs, sorted by key for stable listings.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs = self
            .map
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Vec<_>>();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = Store::new();
        store.apply(&Command::Put {
            key: "k1".to_string(),
            value: "v1".to_string(),
        });
        assert_eq!(store.get("k1"), Some("v1".to_string()));
        store.apply(&Command::Delete { key: "k1".to_string() });
        assert_eq!(store.get("k1"), None);
    }

    #[test]
    fn apply_is_idempotent() {
        let store = Store::new();
        let put = Command::Put {
            key: "k1".to_string(),
            value: "v1".to_string(),
        };
        store.apply(&put);
        let once = store.snapshot();
        store.apply(&put);
        assert_eq!(store.snapshot(), once);

        let delete = Command::Delete { key: "k1".to_string() };
        store.apply(&delete);
        let once = store.snapshot();
        store.apply(&delete);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn snapshot_is_sorted() {
        let store = Store::new();
        for key in &["b", "a", "c"] {
            store.apply(&Command::Put {
                key: key.to_string(),
                value: "v".to_string(),
            });
        }
        let keys = store
            .snapshot()
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
