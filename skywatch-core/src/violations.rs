//! Violator Store
//!
//! Authoritative map of drones currently inside the no-fly zone, plus the
//! dedup guard that keeps pilot lookups to at most one in flight per drone.
//!
//! A record lives for one violation episode: created on the first observed
//! intrusion, refreshed by every later one, and deleted by the evictor once
//! the drone has stayed out of the zone for the configured TTL. Two fields
//! carry invariants across updates:
//!
//! - `closest_distance` never increases (closest approach of the episode)
//! - `last_violation_at_ms` never decreases

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::pilot::Pilot;
use crate::TimestampMs;

/// One tracked violator.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationRecord {
    /// Drone serial number
    pub drone_id: String,
    /// Resolved pilot, `None` until the registry lookup succeeds
    pub pilot: Option<Pilot>,
    /// Closest observed approach to the zone center, millimetres
    pub closest_distance: f64,
    /// Feed timestamp of the latest observed violation
    pub last_violation_at_ms: TimestampMs,
}

impl ViolationRecord {
    /// Client-visible projection, available once the pilot is resolved.
    pub fn client_view(&self) -> Option<ViolatorView> {
        self.pilot.as_ref().map(|pilot| ViolatorView {
            serial_number: self.drone_id.clone(),
            pilot: pilot.clone(),
            closest_distance: self.closest_distance,
            last_violation_at: self.last_violation_at_ms,
        })
    }
}

/// What the sync endpoint shows clients for one violator.
///
/// Lookup bookkeeping never appears here; an unresolved record has no view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolatorView {
    pub serial_number: String,
    pub pilot: Pilot,
    pub closest_distance: f64,
    pub last_violation_at: TimestampMs,
}

/// Map of active violation records, keyed by drone serial.
#[derive(Debug, Default)]
pub struct ViolationStore {
    records: HashMap<String, ViolationRecord>,
}

impl ViolationStore {
    pub fn new() -> Self {
        ViolationStore::default()
    }

    /// Record an observed violation.
    ///
    /// Creates the record on first observation; on later ones refreshes
    /// `last_violation_at_ms` (never backwards) and `closest_distance`
    /// (never upwards). Returns the record after the update.
    pub fn observe(
        &mut self,
        drone_id: &str,
        distance: f64,
        captured_at_ms: TimestampMs,
    ) -> &ViolationRecord {
        let record = self
            .records
            .entry(drone_id.to_string())
            .and_modify(|r| {
                r.closest_distance = r.closest_distance.min(distance);
                r.last_violation_at_ms = r.last_violation_at_ms.max(captured_at_ms);
            })
            .or_insert_with(|| ViolationRecord {
                drone_id: drone_id.to_string(),
                pilot: None,
                closest_distance: distance,
                last_violation_at_ms: captured_at_ms,
            });
        record
    }

    /// Attach a resolved pilot. Returns false when the record is gone
    /// (evicted while the lookup was in flight).
    pub fn set_pilot(&mut self, drone_id: &str, pilot: Pilot) -> bool {
        match self.records.get_mut(drone_id) {
            Some(record) => {
                record.pilot = Some(pilot);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, drone_id: &str) -> Option<&ViolationRecord> {
        self.records.get(drone_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViolationRecord> {
        self.records.values()
    }

    /// Remove every record whose last violation is older than `ttl_ms`,
    /// returning the removed records so the caller can log Removed events.
    pub fn evict_expired(&mut self, now_ms: TimestampMs, ttl_ms: u64) -> Vec<ViolationRecord> {
        let expired: Vec<String> = self
            .records
            .values()
            .filter(|r| now_ms.saturating_sub(r.last_violation_at_ms) > ttl_ms)
            .map(|r| r.drone_id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect()
    }
}

/// Drones with an outstanding pilot lookup.
///
/// Membership spans from the moment a lookup is issued until it completes,
/// success or terminal failure. The engine consults this set before
/// signalling "needs lookup", which is what guarantees at most one
/// concurrent registry call per drone.
#[derive(Debug, Default)]
pub struct PendingLookupSet {
    pending: HashSet<String>,
}

impl PendingLookupSet {
    pub fn new() -> Self {
        PendingLookupSet::default()
    }

    /// Mark a lookup as issued. Returns false if one was already in flight.
    pub fn insert(&mut self, drone_id: &str) -> bool {
        self.pending.insert(drone_id.to_string())
    }

    /// Mark the lookup as completed.
    pub fn remove(&mut self, drone_id: &str) -> bool {
        self.pending.remove(drone_id)
    }

    pub fn contains(&self, drone_id: &str) -> bool {
        self.pending.contains(drone_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
