use crate::message::{AckHandle, TelemetryMessage};
use anyhow::Result;
use async_trait::async_trait;

/// Pull/acknowledge boundary to the telemetry queue.
///
/// Implementations should:
/// - Block server-side until at least one message is available (long-poll,
///   not busy-spin), bounded by a request timeout
/// - Deliver at-least-once: unacknowledged messages are redelivered
/// - Support acknowledging a whole batch of handles in one call
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetrySubscription: Send + Sync {
    /// Pull up to `max_messages` available messages.
    async fn pull(&self, max_messages: usize) -> Result<Vec<TelemetryMessage>>;

    /// Acknowledge the given handles so the queue stops redelivering them.
    /// Acknowledging an already-acknowledged handle is not an error.
    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<()>;
}
