//! Shared Engine Handle
//!
//! Cloneable handle that serializes all engine access behind one RwLock:
//! the poll cycle and lookup completions take the write lock, sync reads
//! take the read lock. The lock is never held across an await point, so
//! slow feed fetches and registry calls cannot stall client syncs.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use skywatch_core::{
    Engine, LookupCompletion, Observation, Pilot, Position, SyncResponse, Zone,
};

use crate::feed::DroneSnapshot;

/// Wall clock in milliseconds since the epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Process-wide engine instance, cheap to clone into subsystems and
/// request handlers.
#[derive(Clone)]
pub struct SharedEngine {
    engine: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        SharedEngine {
            engine: Arc::new(RwLock::new(engine)),
        }
    }

    /// Classify one feed snapshot batch. Returns the serials that now need
    /// a pilot lookup; each is already marked pending in the engine.
    pub fn observe_batch(&self, snapshots: &[DroneSnapshot]) -> Vec<String> {
        let mut engine = self.engine.write().unwrap();

        let mut needs_lookup = Vec::new();
        for snapshot in snapshots {
            let position = Position::new(snapshot.position_x, snapshot.position_y);
            match engine.observe(&snapshot.serial_number, position, snapshot.captured_at_ms) {
                Observation::Violating { needs_lookup: true } => {
                    needs_lookup.push(snapshot.serial_number.clone());
                }
                Observation::Violating { needs_lookup: false } | Observation::Outside => {}
            }
        }
        needs_lookup
    }

    /// Deliver a lookup result (`None` = terminal failure) to the engine.
    pub fn complete_lookup(&self, serial_number: &str, pilot: Option<Pilot>) -> LookupCompletion {
        self.engine
            .write()
            .unwrap()
            .complete_lookup(serial_number, pilot, now_ms())
    }

    /// Run the eviction passes. Returns the evicted serials.
    pub fn evict(&self) -> Vec<String> {
        self.engine.write().unwrap().evict(now_ms())
    }

    /// Serve one client poll.
    pub fn sync(&self, cursor: Option<u64>) -> SyncResponse {
        self.engine.read().unwrap().sync(cursor, now_ms())
    }

    pub fn zone(&self) -> Zone {
        *self.engine.read().unwrap().zone()
    }

    pub fn tracked(&self) -> usize {
        self.engine.read().unwrap().tracked()
    }

    pub fn pending_lookups(&self) -> usize {
        self.engine.read().unwrap().pending_lookups()
    }
}
