//! Skywatch Core
//!
//! Platform-independent engine that tracks drones violating a circular
//! no-fly zone and serves incremental deltas of the violator set to
//! polling clients.
//!
//! # Architecture
//!
//! The crate is split into several modules:
//!
//! - **geofence**: The no-fly zone and the distance/violation predicate
//! - **pilot**: Registered pilot identity attached to a violator
//! - **violations**: Authoritative violator store and lookup dedup guard
//! - **timeline**: Append-only event log used to compute client deltas
//! - **engine**: Facade tying the above together behind one mutation path
//!
//! # Usage
//!
//! ```rust,ignore
//! use skywatch_core::{Engine, EngineConfig, Observation, Position};
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//!
//! // Each poll cycle: observe feed entries, then age out stale records.
//! let observation = engine.observe("SN-1", Position::new(250_000.0, 251_000.0), captured_at);
//! if let Observation::Violating { needs_lookup: true } = observation {
//!     // issue a pilot lookup, then:
//!     // engine.complete_lookup("SN-1", Some(pilot), now);
//! }
//! engine.evict(now);
//!
//! // Serve a client delta.
//! let response = engine.sync(Some(cursor), now);
//! ```
//!
//! The engine has no clock of its own; every entry point takes explicit
//! millisecond timestamps so the host decides what "now" means. All I/O
//! (feed retrieval, pilot lookups, the HTTP surface) lives in the host
//! crate.

pub mod engine;
pub mod geofence;
pub mod pilot;
pub mod timeline;
pub mod violations;

// Geometry re-export so hosts construct positions with the same nalgebra
// version the engine was built against.
pub use nalgebra;

pub use engine::{Engine, EngineConfig, ConfigError, LookupCompletion, Observation, SyncResponse};
pub use geofence::{Position, Zone};
pub use pilot::Pilot;
pub use timeline::{EventKind, EventTimeline, TimelineEvent};
pub use violations::{PendingLookupSet, ViolationRecord, ViolationStore, ViolatorView};

/// Milliseconds since the Unix epoch, the only time unit used in this crate.
pub type TimestampMs = u64;
