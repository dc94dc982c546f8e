//! Drone Position Feed
//!
//! Client for the upstream position feed. The feed document is a JSON
//! object carrying a capture timestamp and an array of drone entries:
//!
//! ```json
//! {
//!   "capturedAt": "2026-08-06T10:15:00.000Z",
//!   "drones": [
//!     { "serialNumber": "SN-1", "positionX": 250000.0, "positionY": 251000.0 }
//!   ]
//! }
//! ```
//!
//! Entries may override `capturedAt` individually. Timestamps are accepted
//! as RFC 3339 strings or as integer milliseconds since the epoch.
//! Malformed entries are skipped one by one; a single bad drone must not
//! cost the rest of the snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::shared::now_ms;

/// One parsed feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneSnapshot {
    pub serial_number: String,
    pub position_x: f64,
    pub position_y: f64,
    pub captured_at_ms: u64,
}

/// Feed retrieval failure. Always non-fatal: the poll cycle logs it and
/// degrades to eviction-only until the next tick.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned HTTP status {0}")]
    Status(u16),
}

/// Source of position snapshots, one implementation per transport.
#[async_trait]
pub trait DroneFeed {
    async fn fetch(&self) -> Result<Vec<DroneSnapshot>, FeedError>;
}

/// Custom deserializer for timestamps that accepts both an RFC 3339 string
/// and integer milliseconds since the epoch.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;

    match value {
        None => Ok(None),
        Some(serde_json::Value::Number(n)) => match n.as_u64() {
            Some(ms) => Ok(Some(ms)),
            None => Err(D::Error::custom("timestamp must be a non-negative integer")),
        },
        Some(serde_json::Value::String(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.timestamp_millis().max(0) as u64))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{}': {}", s, e))),
        Some(_) => Err(D::Error::custom("timestamp must be a number or a string")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedDocument {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    captured_at: Option<u64>,
    #[serde(default)]
    drones: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedEntry {
    serial_number: String,
    position_x: f64,
    position_y: f64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    captured_at: Option<u64>,
}

/// Parse a feed document, skipping malformed entries individually.
///
/// Capture-time precedence: entry `capturedAt`, then document `capturedAt`,
/// then `fallback_ms` (the fetch wall time).
pub fn parse_feed_document(document: &serde_json::Value, fallback_ms: u64) -> Vec<DroneSnapshot> {
    let document: FeedDocument = match serde_json::from_value(document.clone()) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("feed: unparseable document: {}", e);
            return Vec::new();
        }
    };

    let default_captured_at = document.captured_at.unwrap_or(fallback_ms);
    let mut skipped = 0usize;

    let snapshots: Vec<DroneSnapshot> = document
        .drones
        .iter()
        .filter_map(|raw| match serde_json::from_value::<FeedEntry>(raw.clone()) {
            Ok(entry) => Some(DroneSnapshot {
                serial_number: entry.serial_number,
                position_x: entry.position_x,
                position_y: entry.position_y,
                captured_at_ms: entry.captured_at.unwrap_or(default_captured_at),
            }),
            Err(e) => {
                skipped += 1;
                log::debug!("feed: skipping malformed entry: {}", e);
                None
            }
        })
        .collect();

    if skipped > 0 {
        log::warn!("feed: skipped {} malformed entries", skipped);
    }
    snapshots
}

/// HTTP implementation of [`DroneFeed`].
pub struct HttpDroneFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpDroneFeed {
    /// `timeout` must stay below the poll interval so a hung fetch frees
    /// the cycle for retry instead of stacking stale requests.
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpDroneFeed {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl DroneFeed for HttpDroneFeed {
    async fn fetch(&self) -> Result<Vec<DroneSnapshot>, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let document: serde_json::Value = response.json().await?;
        Ok(parse_feed_document(&document, now_ms()))
    }
}
