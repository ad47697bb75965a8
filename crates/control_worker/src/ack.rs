use fanctl_domain::{AckHandle, TelemetrySubscription};
use std::sync::Arc;
use tracing::debug;

/// Issues the per-cycle batch acknowledgment.
///
/// All eligible handles from one pull cycle go out in a single call, so a
/// cycle costs at most two network round trips (one pull, one ack). An
/// empty handle set performs no call at all.
pub struct AckCoordinator {
    subscription: Arc<dyn TelemetrySubscription>,
}

impl AckCoordinator {
    pub fn new(subscription: Arc<dyn TelemetrySubscription>) -> Self {
        Self { subscription }
    }

    /// Acknowledge the handles of all resolved-and-ackable messages.
    /// Failure here is non-fatal to the loop: the affected messages are
    /// simply redelivered, which at-least-once consumers must tolerate.
    pub async fn acknowledge(&self, handles: Vec<AckHandle>) -> anyhow::Result<()> {
        if handles.is_empty() {
            debug!("no ackable messages, skipping acknowledge call");
            return Ok(());
        }

        self.subscription.acknowledge(&handles).await
    }
}
