//! Pilot Registry Lookup
//!
//! Resolves a drone serial number to its registered pilot through the
//! registry service. Lookups are issued at most once per drone at a time
//! (the engine's pending set guarantees this); a failed lookup is simply
//! retried by a later poll cycle while the violator is still tracked.

use async_trait::async_trait;
use thiserror::Error;

use skywatch_core::Pilot;

/// Lookup failure. Non-fatal; the record stays unresolved.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned HTTP status {0}")]
    Status(u16),
}

/// Registry lookup, one implementation per transport.
#[async_trait]
pub trait PilotResolver {
    async fn resolve(&self, serial_number: &str) -> Result<Pilot, LookupError>;
}

/// HTTP implementation of [`PilotResolver`]: GET `{base_url}/{serial}`.
pub struct HttpPilotResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPilotResolver {
    /// `timeout` must stay below the poll interval, same as the feed's.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpPilotResolver {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, serial_number: &str) -> String {
        format!("{}/{}", self.base_url, serial_number)
    }
}

#[async_trait]
impl PilotResolver for HttpPilotResolver {
    async fn resolve(&self, serial_number: &str) -> Result<Pilot, LookupError> {
        let response = self.client.get(self.url_for(serial_number)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        Ok(response.json::<Pilot>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_url_join_handles_trailing_slash() {
        let resolver =
            HttpPilotResolver::new("http://registry.local/pilots/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            resolver.url_for("SN-1"),
            "http://registry.local/pilots/SN-1"
        );

        let resolver =
            HttpPilotResolver::new("http://registry.local/pilots", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            resolver.url_for("SN-1"),
            "http://registry.local/pilots/SN-1"
        );
    }

    #[test]
    fn test_pilot_payload_shape() {
        let json = serde_json::json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane.doe@example.com",
            "phoneNumber": "+358501234567"
        });

        let pilot: Pilot = serde_json::from_value(json).unwrap();
        assert_eq!(pilot.first_name, "Jane");
        assert_eq!(pilot.phone_number, "+358501234567");
    }
}
