//! Event Timeline
//!
//! Append-only, time-ordered log of violator set changes, scanned with a
//! timestamp cursor to build client deltas. Events carry wall-clock
//! timestamps taken when the server's visible state changed, not the feed's
//! capture time: a sync cursor must track what the client has already seen
//! of *this server's* state.
//!
//! Old events are purged after a retention window so a briefly disconnected
//! client can still catch up, while memory stays bounded.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::violations::ViolatorView;
use crate::TimestampMs;

/// What changed in the violator set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum EventKind {
    /// A violator became visible to clients (pilot lookup resolved).
    Added { drone_id: String },
    /// A violator aged out. Carries a snapshot of the client-visible
    /// fields; the record itself is already gone from the store.
    Removed { snapshot: ViolatorView },
}

impl EventKind {
    /// Drone serial the event concerns.
    pub fn drone_id(&self) -> &str {
        match self {
            EventKind::Added { drone_id } => drone_id,
            EventKind::Removed { snapshot } => &snapshot.serial_number,
        }
    }
}

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub timestamp_ms: TimestampMs,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Append-only ordered event log.
///
/// Invariant: timestamps are non-decreasing front to back, ties in
/// insertion order. `since` relies on this to stay monotone.
#[derive(Debug, Default)]
pub struct EventTimeline {
    events: VecDeque<TimelineEvent>,
}

impl EventTimeline {
    pub fn new() -> Self {
        EventTimeline::default()
    }

    /// Append an event.
    ///
    /// A timestamp older than the newest entry (backwards wall-clock step)
    /// is clamped up to it, so ordering never breaks and the event still
    /// reaches clients whose cursor is at the previous maximum.
    pub fn append(&mut self, kind: EventKind, timestamp_ms: TimestampMs) {
        let timestamp_ms = match self.events.back() {
            Some(last) => timestamp_ms.max(last.timestamp_ms),
            None => timestamp_ms,
        };
        self.events.push_back(TimelineEvent { timestamp_ms, kind });
    }

    /// Events strictly after `cursor`, oldest first, plus the new cursor:
    /// the maximum scanned timestamp, or `cursor` unchanged when nothing
    /// matched. Repeated calls with returned cursors never re-return an
    /// event.
    pub fn since(&self, cursor: TimestampMs) -> (Vec<&TimelineEvent>, TimestampMs) {
        let start = self.events.partition_point(|e| e.timestamp_ms <= cursor);
        let events: Vec<&TimelineEvent> = self.events.range(start..).collect();
        let new_cursor = events.last().map_or(cursor, |e| e.timestamp_ms);
        (events, new_cursor)
    }

    /// Drop events (and their retained snapshots) strictly older than
    /// `cutoff_ms`.
    pub fn purge_older_than(&mut self, cutoff_ms: TimestampMs) {
        while let Some(front) = self.events.front() {
            if front.timestamp_ms < cutoff_ms {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
