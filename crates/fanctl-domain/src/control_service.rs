use crate::decision::decide;
use crate::device_config::DeviceConfigPusher;
use crate::error::DomainResult;
use crate::message::{DeviceAddress, TelemetryMessage, TelemetryReading};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Terminal disposition of one successfully handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A directive was pushed to the device.
    Updated,
    /// The reading was in range; the device was not contacted.
    Skipped,
}

/// Domain service that maps one telemetry message to a disposition
///
/// Flow:
/// 1. Decode the payload as a telemetry reading
/// 2. Derive the device address from the message attributes
/// 3. Evaluate the threshold rule
/// 4. Push the directive when the rule produced one
pub struct DeviceControlService {
    pusher: Arc<dyn DeviceConfigPusher>,
}

impl DeviceControlService {
    pub fn new(pusher: Arc<dyn DeviceConfigPusher>) -> Self {
        Self { pusher }
    }

    /// Process a single pulled message. Errors here are terminal for the
    /// message within this cycle; the caller leaves the message
    /// unacknowledged so the queue redelivers it.
    #[instrument(skip(self, message), fields(ack_handle = %message.ack_handle.as_str()))]
    pub async fn process_message(&self, message: &TelemetryMessage) -> DomainResult<Disposition> {
        let reading = TelemetryReading::from_payload(&message.payload)?;
        let address = DeviceAddress::from_attributes(&message.attributes)?;

        debug!(
            device_id = %address.device_id,
            temperature = reading.temperature,
            publish_time = ?message.publish_time,
            "processing telemetry reading"
        );

        let Some(config) = decide(&reading) else {
            debug!(
                device_id = %address.device_id,
                temperature = reading.temperature,
                "temperature in range, no config update needed"
            );
            return Ok(Disposition::Skipped);
        };

        info!(
            device_id = %address.device_id,
            fan_on = config.fan_on,
            "setting fan state for device"
        );

        self.pusher.push_config(&address, &config).await?;

        Ok(Disposition::Updated)
    }
}
