use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use fanctl_domain::{AckHandle, TelemetryMessage};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Wire model of a `:pull` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    #[serde(default)]
    pub received_messages: Vec<ReceivedMessage>,
}

/// One pulled message: the ack token plus the message body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message: QueueMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    /// Base64-encoded payload bytes.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub publish_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Convert a wire message to the domain TelemetryMessage.
///
/// An undecodable `data` field is kept as the raw bytes rather than
/// dropped: the message still flows through the batch, fails payload
/// decoding there, and is left unacknowledged for redelivery. Dropping it
/// here would leave a pulled message without an outcome.
pub fn received_to_domain(received: ReceivedMessage) -> TelemetryMessage {
    let payload = match BASE64.decode(received.message.data.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                ack_id = %received.ack_id,
                error = %e,
                "message data is not valid base64, passing raw bytes through"
            );
            received.message.data.into_bytes()
        }
    };

    TelemetryMessage {
        ack_handle: AckHandle::new(received.ack_id),
        attributes: received.message.attributes,
        payload,
        publish_time: received.message.publish_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_message_to_domain() {
        let json = r#"{
            "ackId": "ack-42",
            "message": {
                "data": "eyJ0ZW1wZXJhdHVyZSI6IC01fQ==",
                "attributes": {"deviceId": "d1", "projectId": "p1"},
                "publishTime": "2024-05-01T12:00:00Z"
            }
        }"#;
        let received: ReceivedMessage = serde_json::from_str(json).unwrap();

        let message = received_to_domain(received);

        assert_eq!(message.ack_handle.as_str(), "ack-42");
        assert_eq!(message.payload, br#"{"temperature": -5}"#);
        assert_eq!(message.attributes.get("deviceId").unwrap(), "d1");
        assert!(message.publish_time.is_some());
    }

    #[test]
    fn test_missing_fields_default() {
        let json = r#"{"ackId": "ack-1", "message": {}}"#;
        let received: ReceivedMessage = serde_json::from_str(json).unwrap();

        let message = received_to_domain(received);

        assert!(message.payload.is_empty());
        assert!(message.attributes.is_empty());
        assert!(message.publish_time.is_none());
    }

    #[test]
    fn test_invalid_base64_passes_raw_bytes() {
        let json = r#"{"ackId": "ack-1", "message": {"data": "%%% not base64 %%%"}}"#;
        let received: ReceivedMessage = serde_json::from_str(json).unwrap();

        let message = received_to_domain(received);

        // Raw bytes survive so the message still resolves to a Failed
        // outcome downstream instead of vanishing.
        assert_eq!(message.payload, b"%%% not base64 %%%");
    }

    #[test]
    fn test_empty_pull_response() {
        let response: PullResponse = serde_json::from_str("{}").unwrap();
        assert!(response.received_messages.is_empty());
    }
}
