//! # Summary
//!
//! This module parses and formats the command strings that the cluster
//! agrees on. The Paxos value itself stays an opaque `String` end to end;
//! a `Command` is only materialized at the edges, when a client request is
//! turned into a value to propose and when a decided value is applied to
//! the local store.

use crate::error::Error;

/// A write operation on the replicated store, in its `PUT <k> <v>` /
/// `DELETE <k>` wire spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Delete { key: String },
}

impl std::fmt::Display for Command {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | Command::Put { key, value } => write!(fmt, "PUT {} {}", key, value),
        | Command::Delete { key } => write!(fmt, "DELETE {}", key),
        }
    }
}

impl std::str::FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedCommand(s.to_string());
        let mut iter = s.trim().splitn(3, ' ');
        match iter.next() {
        | Some("PUT") => {
            let key = iter.next().filter(|key| !key.is_empty()).ok_or_else(malformed)?;
            let value = iter.next().filter(|value| !value.is_empty()).ok_or_else(malformed)?;
            Ok(Command::Put {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        | Some("DELETE") => {
            let key = iter.next().filter(|key| !key.is_empty()).ok_or_else(malformed)?;
            if iter.next().is_some() {
                return Err(malformed());
            }
            Ok(Command::Delete { key: key.to_string() })
        }
        | _ => Err(malformed()),
        }
    }
}
