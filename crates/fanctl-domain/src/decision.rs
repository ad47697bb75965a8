use crate::message::TelemetryReading;
use serde::{Deserialize, Serialize};

/// Desired fan configuration to push to a device. This is the payload the
/// device receives, so the wire field name is part of the device contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanConfig {
    pub fan_on: bool,
}

/// Fan control threshold rule.
///
/// - below 0 degrees the fan turns off
/// - above 10 degrees the fan turns on
/// - in between (inclusive) the device is not contacted at all
///
/// The boundaries are exclusive: readings of exactly 0 or 10 produce no
/// directive. Pure and total; no I/O.
pub fn decide(reading: &TelemetryReading) -> Option<FanConfig> {
    if reading.temperature < 0.0 {
        Some(FanConfig { fan_on: false })
    } else if reading.temperature > 10.0 {
        Some(FanConfig { fan_on: true })
    } else {
        None
    }
}
