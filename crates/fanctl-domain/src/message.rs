use crate::error::{DomainError, DomainResult};
use serde::Deserialize;
use std::collections::HashMap;

/// Message attribute keys the queue attaches to every telemetry event.
/// These are supplied by the device-management layer and identify the
/// originating device.
pub const ATTR_PROJECT_ID: &str = "projectId";
pub const ATTR_REGISTRY_ID: &str = "deviceRegistryId";
pub const ATTR_DEVICE_ID: &str = "deviceId";
pub const ATTR_REGISTRY_LOCATION: &str = "deviceRegistryLocation";

/// Opaque token identifying a pulled message for acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckHandle(String);

impl AckHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A telemetry event as pulled from the queue. Immutable once pulled.
#[derive(Debug, Clone)]
pub struct TelemetryMessage {
    pub ack_handle: AckHandle,
    pub attributes: HashMap<String, String>,
    pub payload: Vec<u8>,
    pub publish_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Decoded form of a telemetry payload. Devices report JSON; only the
/// temperature field participates in the control decision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryReading {
    pub temperature: f64,
}

impl TelemetryReading {
    /// Decode a reading from raw payload bytes. A malformed payload is a
    /// terminal per-message error, not a retryable one.
    pub fn from_payload(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload).map_err(|e| DomainError::MalformedPayload(e.to_string()))
    }
}

/// Fully-qualified device address, derived entirely from message
/// attributes, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub project_id: String,
    pub region: String,
    pub registry_id: String,
    pub device_id: String,
}

impl DeviceAddress {
    pub fn from_attributes(attributes: &HashMap<String, String>) -> DomainResult<Self> {
        let get = |key: &str| -> DomainResult<String> {
            attributes
                .get(key)
                .cloned()
                .ok_or_else(|| DomainError::MissingAttribute(key.to_string()))
        };

        Ok(Self {
            project_id: get(ATTR_PROJECT_ID)?,
            region: get(ATTR_REGISTRY_LOCATION)?,
            registry_id: get(ATTR_REGISTRY_ID)?,
            device_id: get(ATTR_DEVICE_ID)?,
        })
    }

    /// Resource path used to route requests to the device-management API.
    pub fn device_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.project_id, self.region, self.registry_id, self.device_id
        )
    }
}

/// Terminal per-message result for one pull cycle. Every pulled message
/// resolves to exactly one outcome before the cycle's ack step runs.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Directive pushed to the device.
    Success,
    /// No directive needed; the message is still acknowledged.
    Skipped,
    /// Decode or push failed; left unacknowledged for redelivery.
    Failed(DomainError),
}

impl MessageOutcome {
    /// Whether the message's ack handle is eligible for acknowledgment.
    pub fn is_ackable(&self) -> bool {
        !matches!(self, MessageOutcome::Failed(_))
    }
}
