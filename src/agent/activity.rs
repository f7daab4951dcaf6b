//! Activity Log
//!
//! Session history of everything the agent did, newest first, bounded to a
//! retention window. Survives agent resets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

pub const DEFAULT_ACTIVITY_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Request,
    Payment,
    /// The payer refused to sign a transfer
    Declined,
    Unlock,
    /// Wallet, network or transaction-mode changes
    Network,
    Error,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Request => "request",
            ActivityKind::Payment => "payment",
            ActivityKind::Declined => "declined",
            ActivityKind::Unlock => "unlock",
            ActivityKind::Network => "network",
            ActivityKind::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
    sequence: u64,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            sequence: 0,
        }
    }

    /// Record an event at the head of the log, dropping the oldest entries
    /// beyond capacity
    pub fn append(
        &mut self,
        kind: ActivityKind,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> &ActivityEntry {
        let timestamp = Utc::now();
        self.sequence += 1;

        let entry = ActivityEntry {
            // millis + sequence is unique per log; the random suffix keeps ids
            // distinct across logs merged for display
            id: format!(
                "{}-{}-{:04x}",
                timestamp.timestamp_millis(),
                self.sequence,
                rand::random::<u16>()
            ),
            timestamp,
            kind,
            message: message.into(),
            details,
        };
        info!(kind = %entry.kind, "{}", entry.message);

        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Entries, newest first
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &ActivityEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}
