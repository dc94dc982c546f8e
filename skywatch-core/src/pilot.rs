//! Pilot Identity
//!
//! The registry record attached to a violator once the lookup service
//! resolves the drone's serial number. Serialized for the REST API.

use serde::{Deserialize, Serialize};

/// Registered pilot of a drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pilot {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
}

impl Pilot {
    /// "First Last", for log lines.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
