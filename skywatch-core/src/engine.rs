//! Violation Engine
//!
//! Facade over the violator store, the pending-lookup guard and the event
//! timeline. Every mutation of tracked state goes through this one type,
//! which is what lets the host serialize writers with a single lock.
//!
//! The engine is clock-less: `observe` takes the feed's capture time,
//! while `complete_lookup`, `evict` and `sync` take the host's wall clock.
//! Capture time drives record aging; wall time drives event timestamps and
//! cursors, because a cursor tracks when *this server's* visible state
//! changed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geofence::{Position, Zone};
use crate::pilot::Pilot;
use crate::timeline::{EventKind, EventTimeline};
use crate::violations::{PendingLookupSet, ViolationStore, ViolatorView};
use crate::TimestampMs;

/// Engine configuration. All durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// The no-fly zone
    pub zone: Zone,
    /// Feed poll interval; also the assumed client polling interval
    pub update_interval_ms: u64,
    /// How long a violator stays tracked after its last observed violation
    pub pilot_ttl_ms: u64,
    /// How long emitted events stay available to catching-up clients
    pub event_retention_ms: u64,
    /// Cursor age beyond which a sync degrades to a full snapshot
    pub sync_stale_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            zone: Zone::new(250_000.0, 250_000.0, 100_000.0),
            update_interval_ms: 2_000,
            pilot_ttl_ms: 600_000,
            event_retention_ms: 30_000,
            sync_stale_timeout_ms: 60_000,
        }
    }
}

/// Configuration rejected at engine construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("zone radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    #[error("zone center coordinates must be finite")]
    NonFiniteCenter,

    #[error("pilot TTL must be positive")]
    ZeroPilotTtl,

    /// A retention window at or below the polling interval loses events
    /// for any client that misses a single poll.
    #[error("event retention {retention_ms}ms must exceed the update interval {interval_ms}ms")]
    RetentionTooShort { retention_ms: u64, interval_ms: u64 },
}

impl EngineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.zone.center_x.is_finite() && self.zone.center_y.is_finite()) {
            return Err(ConfigError::NonFiniteCenter);
        }
        if !(self.zone.radius.is_finite() && self.zone.radius > 0.0) {
            return Err(ConfigError::NonPositiveRadius(self.zone.radius));
        }
        if self.pilot_ttl_ms == 0 {
            return Err(ConfigError::ZeroPilotTtl);
        }
        if self.event_retention_ms <= self.update_interval_ms {
            return Err(ConfigError::RetentionTooShort {
                retention_ms: self.event_retention_ms,
                interval_ms: self.update_interval_ms,
            });
        }
        Ok(())
    }
}

/// Outcome of observing one feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Outside the zone; ignored (an earlier violation ages out via TTL)
    Outside,
    /// Inside the zone; record created or refreshed. `needs_lookup` is
    /// true when the caller must issue a pilot lookup for this drone —
    /// the id was just added to the pending set.
    Violating { needs_lookup: bool },
}

/// Outcome of a pilot lookup completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupCompletion {
    /// Pilot attached, `Added` event emitted
    Resolved,
    /// Lookup failed; record left unresolved for the next cycle to retry
    Failed,
    /// Record was evicted while the lookup was in flight; result dropped
    Discarded,
}

/// What a sync call returns to one client.
///
/// When both lists mention the same drone (evicted and re-entered inside
/// one delta window), removals apply before additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Violators new to this client, current state
    pub added: Vec<ViolatorView>,
    /// Serials of violators that aged out
    pub removed: Vec<String>,
    /// Cursor to present on the next sync
    pub cursor: TimestampMs,
    /// True when this is a full snapshot rather than a delta
    pub full: bool,
}

/// The violation-tracking and incremental-sync engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    store: ViolationStore,
    pending: PendingLookupSet,
    timeline: EventTimeline,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Engine {
            config,
            store: ViolationStore::new(),
            pending: PendingLookupSet::new(),
            timeline: EventTimeline::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn zone(&self) -> &Zone {
        &self.config.zone
    }

    /// Number of currently tracked violators.
    pub fn tracked(&self) -> usize {
        self.store.len()
    }

    /// Number of pilot lookups in flight.
    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    /// Classify one feed entry.
    ///
    /// Inside the zone: create or refresh the record. The lookup signal
    /// fires whenever the record has no pilot and no lookup is in flight,
    /// which covers both the first observation and the retry after a
    /// failed lookup. The id is already in the pending set when this
    /// returns `needs_lookup: true`; the caller's only job is to issue the
    /// lookup and eventually call [`complete_lookup`](Self::complete_lookup).
    pub fn observe(
        &mut self,
        drone_id: &str,
        position: Position,
        captured_at_ms: TimestampMs,
    ) -> Observation {
        if !self.config.zone.violated_by(&position) {
            return Observation::Outside;
        }

        let distance = self.config.zone.distance_to(&position);
        let record = self.store.observe(drone_id, distance, captured_at_ms);

        let needs_lookup = record.pilot.is_none() && !self.pending.contains(drone_id);
        if needs_lookup {
            self.pending.insert(drone_id);
        }
        Observation::Violating { needs_lookup }
    }

    /// Complete a pilot lookup, success (`Some`) or terminal failure
    /// (`None`). Always clears the pending-set membership, so the next
    /// observe may retry a failure while the record survives its TTL.
    pub fn complete_lookup(
        &mut self,
        drone_id: &str,
        pilot: Option<Pilot>,
        now_ms: TimestampMs,
    ) -> LookupCompletion {
        self.pending.remove(drone_id);

        let Some(pilot) = pilot else {
            return LookupCompletion::Failed;
        };

        if self.store.set_pilot(drone_id, pilot) {
            self.timeline.append(
                EventKind::Added {
                    drone_id: drone_id.to_string(),
                },
                now_ms,
            );
            LookupCompletion::Resolved
        } else {
            // Evicted while the lookup was in flight
            LookupCompletion::Discarded
        }
    }

    /// Age out stale state. Two passes: drop records whose last violation
    /// exceeds the pilot TTL (emitting `Removed` for every violator that
    /// was client-visible), then purge events past the retention window.
    /// Returns the evicted serials.
    pub fn evict(&mut self, now_ms: TimestampMs) -> Vec<String> {
        let expired = self.store.evict_expired(now_ms, self.config.pilot_ttl_ms);

        let mut evicted = Vec::with_capacity(expired.len());
        for record in expired {
            // A record that never resolved was never surfaced by an Added
            // event, so clients have nothing to remove.
            if let Some(snapshot) = record.client_view() {
                self.timeline
                    .append(EventKind::Removed { snapshot }, now_ms);
            }
            evicted.push(record.drone_id);
        }

        self.timeline
            .purge_older_than(now_ms.saturating_sub(self.config.event_retention_ms));
        evicted
    }

    /// Serve one client poll.
    ///
    /// A missing cursor, or one older than the stale timeout, yields a full
    /// snapshot of every resolved violator. Otherwise the timeline delta:
    /// `added` carries the *current* record state for each Added event
    /// whose record still exists and is resolved; `removed` carries the
    /// serial retained in each Removed snapshot.
    pub fn sync(&self, cursor: Option<TimestampMs>, now_ms: TimestampMs) -> SyncResponse {
        let fresh = cursor
            .filter(|c| now_ms.saturating_sub(*c) <= self.config.sync_stale_timeout_ms);
        match fresh {
            None => self.full_snapshot(now_ms),
            Some(cursor) => self.delta(cursor),
        }
    }

    fn full_snapshot(&self, now_ms: TimestampMs) -> SyncResponse {
        let mut added: Vec<ViolatorView> =
            self.store.iter().filter_map(|r| r.client_view()).collect();
        added.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));

        SyncResponse {
            added,
            removed: Vec::new(),
            cursor: now_ms,
            full: true,
        }
    }

    fn delta(&self, cursor: TimestampMs) -> SyncResponse {
        let (events, new_cursor) = self.timeline.since(cursor);

        let mut added: BTreeMap<String, ViolatorView> = BTreeMap::new();
        let mut removed: BTreeSet<String> = BTreeSet::new();

        for event in events {
            match &event.kind {
                EventKind::Added { drone_id } => {
                    // Skip records evicted (or somehow unresolved) since
                    // the event fired; their own Removed event covers them.
                    if let Some(view) = self.store.get(drone_id).and_then(|r| r.client_view()) {
                        added.insert(drone_id.clone(), view);
                    }
                }
                EventKind::Removed { snapshot } => {
                    removed.insert(snapshot.serial_number.clone());
                }
            }
        }

        SyncResponse {
            added: added.into_values().collect(),
            removed: removed.into_iter().collect(),
            cursor: new_cursor,
            full: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IN_ZONE: (f64, f64) = (250_000.0, 250_050.0); // 50mm from center
    const OUT_OF_ZONE: (f64, f64) = (400_000.0, 400_000.0);

    fn test_config() -> EngineConfig {
        EngineConfig {
            zone: Zone::new(250_000.0, 250_000.0, 100.0),
            update_interval_ms: 2_000,
            pilot_ttl_ms: 600_000,
            event_retention_ms: 30_000,
            // Large enough that delta paths stay deltas in TTL scenarios
            sync_stale_timeout_ms: 100_000_000,
        }
    }

    fn engine() -> Engine {
        Engine::new(test_config()).unwrap()
    }

    fn pilot(name: &str) -> Pilot {
        Pilot {
            first_name: name.to_string(),
            last_name: "Tester".to_string(),
            email: format!("{}@example.com", name),
            phone_number: "+358501234567".to_string(),
        }
    }

    fn pos(xy: (f64, f64)) -> Position {
        Position::new(xy.0, xy.1)
    }

    #[test]
    fn test_config_validation() {
        let mut config = test_config();
        config.zone.radius = 0.0;
        assert!(matches!(
            Engine::new(config).unwrap_err(),
            ConfigError::NonPositiveRadius(_)
        ));

        let mut config = test_config();
        config.event_retention_ms = config.update_interval_ms;
        assert!(matches!(
            Engine::new(config).unwrap_err(),
            ConfigError::RetentionTooShort { .. }
        ));

        let mut config = test_config();
        config.zone.center_x = f64::NAN;
        assert!(matches!(
            Engine::new(config).unwrap_err(),
            ConfigError::NonFiniteCenter
        ));
    }

    #[test]
    fn test_observe_outside_zone_is_ignored() {
        let mut engine = engine();
        assert_eq!(
            engine.observe("SN-1", pos(OUT_OF_ZONE), 0),
            Observation::Outside
        );
        assert_eq!(engine.tracked(), 0);
        assert_eq!(engine.pending_lookups(), 0);
    }

    #[test]
    fn test_lookup_needed_once_per_episode() {
        let mut engine = engine();

        assert_eq!(
            engine.observe("SN-1", pos(IN_ZONE), 0),
            Observation::Violating { needs_lookup: true }
        );
        // Repeated observes before the lookup completes: no second signal
        for t in 1..5 {
            assert_eq!(
                engine.observe("SN-1", pos(IN_ZONE), t),
                Observation::Violating {
                    needs_lookup: false
                }
            );
        }
        assert_eq!(engine.pending_lookups(), 1);

        engine.complete_lookup("SN-1", Some(pilot("jane")), 5);
        assert_eq!(engine.pending_lookups(), 0);

        // Resolved record: still no new lookup
        assert_eq!(
            engine.observe("SN-1", pos(IN_ZONE), 6),
            Observation::Violating {
                needs_lookup: false
            }
        );
    }

    #[test]
    fn test_failed_lookup_retried_next_cycle() {
        let mut engine = engine();

        engine.observe("SN-1", pos(IN_ZONE), 0);
        assert_eq!(
            engine.complete_lookup("SN-1", None, 3),
            LookupCompletion::Failed
        );
        assert_eq!(engine.pending_lookups(), 0);

        // Next cycle observes the still-unresolved record: retry fires
        assert_eq!(
            engine.observe("SN-1", pos(IN_ZONE), 2_000),
            Observation::Violating { needs_lookup: true }
        );
    }

    #[test]
    fn test_lookup_for_evicted_record_is_discarded() {
        let mut engine = engine();

        engine.observe("SN-1", pos(IN_ZONE), 0);
        let evicted = engine.evict(700_000);
        assert_eq!(evicted, vec!["SN-1".to_string()]);

        assert_eq!(
            engine.complete_lookup("SN-1", Some(pilot("jane")), 700_001),
            LookupCompletion::Discarded
        );

        // No Added event leaked: a fresh client sees nothing
        let response = engine.sync(Some(0), 700_002);
        assert!(response.added.is_empty());
        assert!(response.removed.is_empty());
    }

    #[test]
    fn test_distance_improvement_updates_record_without_new_event() {
        let mut engine = engine();

        // 80mm out, then 30mm out, same episode
        engine.observe("SN-B", pos((250_000.0, 250_080.0)), 0);
        engine.complete_lookup("SN-B", Some(pilot("bea")), 2);
        engine.observe("SN-B", pos((250_000.0, 250_030.0)), 2_000);

        let response = engine.sync(Some(0), 2_001);
        assert_eq!(response.added.len(), 1);
        assert_eq!(response.added[0].closest_distance, 30.0);
        assert_eq!(response.cursor, 2); // only the single Added event exists

        // No further events: the follow-up sync is an empty delta
        let response = engine.sync(Some(response.cursor), 2_002);
        assert!(response.added.is_empty());
        assert!(response.removed.is_empty());
        assert_eq!(response.cursor, 2);
    }

    #[test]
    fn test_full_episode_lifecycle() {
        let mut engine = engine();

        // Enter at t=0, 50mm from center of a 100mm zone
        engine.observe("SN-A", pos(IN_ZONE), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);

        let response = engine.sync(Some(0), 6);
        assert_eq!(response.added.len(), 1);
        assert_eq!(response.added[0].serial_number, "SN-A");
        assert_eq!(response.added[0].closest_distance, 50.0);
        assert!(!response.full);
        assert_eq!(response.cursor, 5);

        // Ages past the TTL with no new observation
        let evicted = engine.evict(600_005);
        assert_eq!(evicted, vec!["SN-A".to_string()]);
        assert_eq!(engine.tracked(), 0);

        let response = engine.sync(Some(5), 600_006);
        assert!(response.added.is_empty());
        assert_eq!(response.removed, vec!["SN-A".to_string()]);
        assert_eq!(response.cursor, 600_005);
    }

    #[test]
    fn test_eviction_boundary_is_exclusive() {
        let mut engine = engine();
        engine.observe("SN-A", pos(IN_ZONE), 0);

        // now - last == TTL exactly: keep
        assert!(engine.evict(600_000).is_empty());
        // one past: evict
        assert_eq!(engine.evict(600_001).len(), 1);
    }

    #[test]
    fn test_added_then_evicted_within_one_window() {
        let mut engine = engine();

        engine.observe("SN-A", pos(IN_ZONE), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);
        engine.evict(600_005);

        // Client syncing from before the Added event: the add must not
        // surface, only the removal.
        let response = engine.sync(Some(0), 600_006);
        assert!(response.added.is_empty());
        assert_eq!(response.removed, vec!["SN-A".to_string()]);
        assert_eq!(response.cursor, 600_005);
    }

    #[test]
    fn test_sync_idempotent_without_mutation() {
        let mut engine = engine();
        engine.observe("SN-A", pos(IN_ZONE), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);

        let first = engine.sync(Some(5), 10);
        let second = engine.sync(Some(5), 11);
        assert_eq!(first, second);
        assert!(first.added.is_empty());
        assert_eq!(first.cursor, 5);
    }

    #[test]
    fn test_stale_cursor_returns_full_snapshot() {
        let mut config = test_config();
        config.sync_stale_timeout_ms = 60_000;
        let mut engine = Engine::new(config).unwrap();

        engine.observe("SN-A", pos(IN_ZONE), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);
        engine.observe("SN-B", pos(IN_ZONE), 10);
        // SN-B unresolved: absent from snapshots

        let response = engine.sync(Some(5), 70_000);
        assert!(response.full);
        assert_eq!(response.added.len(), 1);
        assert_eq!(response.added[0].serial_number, "SN-A");
        assert!(response.removed.is_empty());
        assert_eq!(response.cursor, 70_000);

        // Missing cursor behaves the same
        let response = engine.sync(None, 70_001);
        assert!(response.full);
        assert_eq!(response.cursor, 70_001);
    }

    #[test]
    fn test_unresolved_eviction_emits_no_removal() {
        let mut engine = engine();

        engine.observe("SN-A", pos(IN_ZONE), 0);
        let evicted = engine.evict(600_001);
        assert_eq!(evicted.len(), 1);

        let response = engine.sync(Some(0), 600_002);
        assert!(response.added.is_empty());
        assert!(response.removed.is_empty());
    }

    #[test]
    fn test_reentry_after_eviction_is_new_episode() {
        let mut engine = engine();

        engine.observe("SN-A", pos((250_000.0, 250_030.0)), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);
        engine.evict(600_010);

        // Re-enters, farther out than the old episode's closest approach
        engine.observe("SN-A", pos((250_000.0, 250_090.0)), 600_020);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 600_025);

        // New episode starts a fresh closest-distance
        let response = engine.sync(Some(600_010), 600_030);
        assert_eq!(response.added.len(), 1);
        assert_eq!(response.added[0].closest_distance, 90.0);

        // A client spanning the whole window sees both the removal and the
        // re-add (removals apply first).
        let response = engine.sync(Some(5), 600_030);
        assert_eq!(response.removed, vec!["SN-A".to_string()]);
        assert_eq!(response.added.len(), 1);
    }

    #[test]
    fn test_event_retention_purges_old_removals() {
        let mut engine = engine();

        engine.observe("SN-A", pos(IN_ZONE), 0);
        engine.complete_lookup("SN-A", Some(pilot("ada")), 5);
        engine.evict(600_005); // Removed at 600_005

        // A later eviction pass far past the retention window drops it
        engine.evict(600_005 + 31_000);

        let response = engine.sync(Some(5), 600_005 + 31_001);
        assert!(response.removed.is_empty());
    }
}
