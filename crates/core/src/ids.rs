//! Identifier generation for messages, reasoning blocks and tool results.
//!
//! Production code uses [`RandomIds`]; tests and fixture replays use
//! [`SequentialIds`] so that the same input bytes produce the same events.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUIDv4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `{prefix}-{n}` identifiers, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("evt");
        assert_eq!(ids.next_id(), "evt-1");
        assert_eq!(ids.next_id(), "evt-2");
    }

    #[test]
    fn random_ids_are_unique() {
        let ids = RandomIds;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
