// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{UserKey, UserValue};

/// A pending builder operation (insertion or deletion).
///
/// The counter is a monotonically increasing sequence number, so
/// deduplication can prefer the latest operation for a given key.
#[derive(Clone, Eq)]
pub(crate) struct Item {
    pub key: UserKey,
    pub value: UserValue,
    pub counter: u64,
    pub tombstone: bool,
}

impl Item {
    pub fn new(key: UserKey, value: UserValue, counter: u64) -> Self {
        Self {
            key,
            value,
            counter,
            tombstone: false,
        }
    }

    pub fn new_tombstone(key: UserKey, counter: u64) -> Self {
        Self {
            key,
            value: UserValue::from(vec![]),
            counter,
            tombstone: true,
        }
    }

    /// Total record size as stored in a slot.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.counter == other.counter
    }
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Ascending by key, descending by counter, so the first occurrence
        // of a key after sorting is the latest operation on it
        self.key
            .cmp(&other.key)
            .then_with(|| other.counter.cmp(&self.counter))
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}:{}{} => {:?}",
            self.key,
            self.counter,
            if self.tombstone { " (tombstone)" } else { "" },
            if self.value.len() >= 64 {
                format!("[ ... {} bytes ]", self.value.len())
            } else {
                format!("{:?}", self.value)
            }
        )
    }
}
