//! Strongly-typed ID types for domain entities.
//!
//! All IDs use ULID (Universally Unique Lexicographically Sortable Identifier) format,
//! providing both uniqueness and temporal ordering — ULIDs sort the same way the
//! spec's "assigned on insert" auto-increment integer ids would.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};
use ulid::{Generator, Ulid};

/// Mints the next ULID from a single process-wide monotonic generator.
///
/// `Ulid::new()` randomizes its low 80 bits independently on every call, so
/// two ids minted within the same millisecond have no guaranteed relative
/// order. Several contracts in this workspace depend on id order reflecting
/// minting order (`output_log`'s `ORDER BY output_log_id` / `> last_seen`
/// streaming cursor chief among them), so every id in this crate is minted
/// through `ulid::Generator` instead, which increments the random part
/// within a millisecond rather than re-randomizing it.
fn next_ulid() -> Ulid {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    let generator = GENERATOR.get_or_init(|| Mutex::new(Generator::new()));
    let mut generator = generator.lock().unwrap();
    loop {
        match generator.generate() {
            Ok(ulid) => return ulid,
            // The generator's per-millisecond counter is exhausted; wait for
            // the clock to tick and resume minting from the new millisecond.
            Err(_) => std::thread::sleep(std::time::Duration::from_millis(1)),
        }
    }
}

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID, minted from the process-wide monotonic
            /// ULID generator so ids sort in minting order even within the
            /// same millisecond.
            #[must_use]
            pub fn new() -> Self {
                Self(next_ulid())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Try with prefix first
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = if let Some(stripped) = s.strip_prefix(prefix_with_underscore) {
                    stripped
                } else {
                    // Try parsing as raw ULID
                    s
                };

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }

        impl From<$name> for Ulid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a task.
    TaskId,
    "task"
);

define_id!(
    /// Unique identifier for a process log record.
    ProcessLogId,
    "plog"
);

define_id!(
    /// Unique identifier for an output log record.
    OutputLogId,
    "olog"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_format() {
        let id = TaskId::new();
        let display = id.to_string();
        assert!(display.starts_with("task_"));
    }

    #[test]
    fn process_log_id_display_format() {
        let id = ProcessLogId::new();
        let display = id.to_string();
        assert!(display.starts_with("plog_"));
    }

    #[test]
    fn parse_with_prefix() {
        let id = TaskId::new();
        let display = id.to_string();
        let parsed: TaskId = display.parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_without_prefix() {
        let ulid = Ulid::new();
        let id: TaskId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parse_invalid_ulid() {
        let result: Result<TaskId, _> = "not_a_ulid".parse();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.id_type, "TaskId");
    }

    #[test]
    fn id_equality() {
        let ulid = Ulid::new();
        let id1 = TaskId::from_ulid(ulid);
        let id2 = TaskId::from_ulid(ulid);
        assert_eq!(id1, id2);
    }

    #[test]
    fn id_ordering_matches_creation_order() {
        let first = TaskId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TaskId::new();
        assert!(first < second);
    }

    #[test]
    fn burst_of_ids_within_one_millisecond_stays_monotonic() {
        // Minting ids back-to-back with no delay is the common case (e.g. one
        // id per output line of a command that prints a burst of lines) and
        // routinely lands several ids in the same millisecond. The generator
        // must still order them by minting order, not just by millisecond.
        let ids: Vec<OutputLogId> = (0..64).map(|_| OutputLogId::new()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn id_hash() {
        use std::collections::HashSet;

        let id1 = TaskId::new();
        let id2 = TaskId::new();

        let mut set = HashSet::new();
        set.insert(id1);
        set.insert(id2);
        set.insert(id1); // duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = ProcessLogId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        let parsed: ProcessLogId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }
}
