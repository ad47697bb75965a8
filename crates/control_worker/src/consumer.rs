use crate::ack::AckCoordinator;
use fanctl_domain::{
    DeviceControlService, Disposition, MessageOutcome, TelemetryMessage, TelemetrySubscription,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before re-pulling after a transport error.
const PULL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Delay before re-pulling after an empty batch. Queues honoring the
/// long-poll request rarely hit this; it bounds the pull rate against
/// ones that answer empty immediately.
const EMPTY_PULL_PAUSE: Duration = Duration::from_millis(100);

/// Pull/process/ack loop over the telemetry subscription.
///
/// Each cycle pulls one batch, processes every message independently, and
/// acknowledges exactly the messages that reached a Success or Skipped
/// outcome. Failed messages stay unacknowledged so the queue redelivers
/// them. Only the pull races against cancellation: once a batch is in
/// flight it always resolves all outcomes and issues its ack, so graceful
/// shutdown never strands half-processed messages.
pub struct TelemetryConsumer {
    subscription: Arc<dyn TelemetrySubscription>,
    service: Arc<DeviceControlService>,
    ack_coordinator: AckCoordinator,
    batch_size: usize,
}

impl TelemetryConsumer {
    pub fn new(
        subscription: Arc<dyn TelemetrySubscription>,
        service: Arc<DeviceControlService>,
        batch_size: usize,
    ) -> Self {
        let ack_coordinator = AckCoordinator::new(Arc::clone(&subscription));
        Self {
            subscription,
            service,
            ack_coordinator,
            batch_size,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(batch_size = self.batch_size, "Starting telemetry consumer loop");

        loop {
            let batch = tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.subscription.pull(self.batch_size) => match result {
                    Ok(batch) => batch,
                    Err(e) => {
                        error!(error = %e, "Error pulling telemetry batch");
                        if Self::pause(&ctx, PULL_ERROR_BACKOFF).await {
                            break;
                        }
                        continue;
                    }
                }
            };

            // A queue that answers an empty pull immediately must not be
            // re-pulled in a tight loop: without an await point here the
            // cycle never yields, starving spawned tasks on a
            // current-thread runtime and busy-spinning the subscription.
            if batch.is_empty() {
                debug!("No messages in batch");
                if Self::pause(&ctx, EMPTY_PULL_PAUSE).await {
                    break;
                }
                continue;
            }

            self.process_batch(batch).await;
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    /// Sleep raced against the cancellation token. Returns true when the
    /// token fired, so callers can stop instead of finishing the pause.
    async fn pause(ctx: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("Received shutdown signal, stopping consumer");
                true
            }
            _ = tokio::time::sleep(duration) => false,
        }
    }

    /// Resolve every message in the batch to exactly one outcome, then
    /// acknowledge the ackable ones in a single call.
    pub(crate) async fn process_batch(&self, batch: Vec<TelemetryMessage>) {
        if batch.is_empty() {
            debug!("No messages in batch");
            return;
        }

        debug!(message_count = batch.len(), "Received message batch");

        // Per-message processing shares no mutable state; outcomes come
        // back through the join results.
        let mut join_set = JoinSet::new();
        for message in batch {
            let service = Arc::clone(&self.service);
            join_set.spawn(async move {
                let outcome = match service.process_message(&message).await {
                    Ok(Disposition::Updated) => MessageOutcome::Success,
                    Ok(Disposition::Skipped) => MessageOutcome::Skipped,
                    Err(e) => MessageOutcome::Failed(e),
                };
                (message.ack_handle, outcome)
            });
        }

        let mut ackable = Vec::new();
        let (mut success, mut skipped, mut failed) = (0usize, 0usize, 0usize);

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((handle, outcome)) => {
                    match &outcome {
                        MessageOutcome::Success => success += 1,
                        MessageOutcome::Skipped => skipped += 1,
                        MessageOutcome::Failed(e) => {
                            warn!(
                                error = %e,
                                ack_handle = %handle.as_str(),
                                "message failed, leaving unacknowledged for redelivery"
                            );
                            failed += 1;
                        }
                    }
                    if outcome.is_ackable() {
                        ackable.push(handle);
                    }
                }
                Err(e) => {
                    // A panicked task resolves nothing; the queue
                    // redelivers its message.
                    error!(error = %e, "message processing task panicked");
                    failed += 1;
                }
            }
        }

        debug!(success, skipped, failed, "batch resolved");

        if let Err(e) = self.ack_coordinator.acknowledge(ackable).await {
            warn!(error = %e, "failed to acknowledge batch, messages will be redelivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanctl_domain::{
        AckHandle, MockDeviceConfigPusher, MockTelemetrySubscription, ATTR_DEVICE_ID,
        ATTR_PROJECT_ID, ATTR_REGISTRY_ID, ATTR_REGISTRY_LOCATION,
    };
    use std::collections::HashMap;

    fn message(ack_id: &str, payload: &[u8]) -> TelemetryMessage {
        TelemetryMessage {
            ack_handle: AckHandle::new(ack_id),
            attributes: HashMap::from([
                (ATTR_PROJECT_ID.to_string(), "p1".to_string()),
                (ATTR_REGISTRY_ID.to_string(), "r1".to_string()),
                (ATTR_DEVICE_ID.to_string(), "d1".to_string()),
                (ATTR_REGISTRY_LOCATION.to_string(), "us-central1".to_string()),
            ]),
            payload: payload.to_vec(),
            publish_time: None,
        }
    }

    fn consumer(
        subscription: MockTelemetrySubscription,
        pusher: MockDeviceConfigPusher,
    ) -> TelemetryConsumer {
        TelemetryConsumer::new(
            Arc::new(subscription),
            Arc::new(DeviceControlService::new(Arc::new(pusher))),
            30,
        )
    }

    #[tokio::test]
    async fn test_malformed_message_excluded_from_ack() {
        // One malformed and two valid messages: exactly the two valid
        // handles get acknowledged.
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_acknowledge()
            .withf(|handles: &[AckHandle]| {
                let ids: Vec<&str> = handles.iter().map(AckHandle::as_str).collect();
                ids.len() == 2 && ids.contains(&"ok-1") && ids.contains(&"ok-2")
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut mock_pusher = MockDeviceConfigPusher::new();
        mock_pusher
            .expect_push_config()
            .times(2)
            .returning(|_, _| Ok(()));

        let consumer = consumer(mock_subscription, mock_pusher);

        consumer
            .process_batch(vec![
                message("ok-1", br#"{"temperature": -5}"#),
                message("bad-1", b"garbage"),
                message("ok-2", br#"{"temperature": 20}"#),
            ])
            .await;
    }

    #[tokio::test]
    async fn test_empty_batch_performs_no_ack() {
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription.expect_acknowledge().times(0);

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        consumer.process_batch(Vec::new()).await;
    }

    #[tokio::test]
    async fn test_skipped_message_still_acknowledged() {
        // In-range temperature: no remote call, but the message is acked.
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_acknowledge()
            .withf(|handles: &[AckHandle]| {
                handles.len() == 1 && handles[0].as_str() == "mild"
            })
            .times(1)
            .returning(|_| Ok(()));

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        consumer
            .process_batch(vec![message("mild", br#"{"temperature": 5}"#)])
            .await;
    }

    #[tokio::test]
    async fn test_push_failure_leaves_message_unacknowledged() {
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription.expect_acknowledge().times(0);

        let mut mock_pusher = MockDeviceConfigPusher::new();
        mock_pusher.expect_push_config().times(1).returning(|_, _| {
            Err(fanctl_domain::DomainError::ConfigError(anyhow::anyhow!(
                "device offline"
            )))
        });

        let consumer = consumer(mock_subscription, mock_pusher);

        consumer
            .process_batch(vec![message("hot", br#"{"temperature": 30}"#)])
            .await;
    }

    #[tokio::test]
    async fn test_ack_failure_is_non_fatal() {
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_acknowledge()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("ack deadline exceeded")));

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        // Must not panic or propagate; the loop would just continue.
        consumer
            .process_batch(vec![message("mild", br#"{"temperature": 5}"#)])
            .await;
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        // The cancel fires from a spawned task, so the loop must yield to
        // the runtime even when every pull resolves empty immediately.
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_pull()
            .returning(|_| Ok(Vec::new()));
        mock_subscription.expect_acknowledge().times(0);

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = consumer.run(ctx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_empty_pulls_do_not_busy_spin() {
        // A queue answering empty immediately gets re-pulled at the paced
        // rate, not in a tight loop; thousands of calls here would trip
        // the expectation's upper bound.
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_pull()
            .times(1..10)
            .returning(|_| Ok(Vec::new()));
        mock_subscription.expect_acknowledge().times(0);

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        assert!(consumer.run(ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_error_backoff() {
        let mut mock_subscription = MockTelemetrySubscription::new();
        mock_subscription
            .expect_pull()
            .returning(|_| Err(anyhow::anyhow!("transport down")));
        mock_subscription.expect_acknowledge().times(0);

        let consumer = consumer(mock_subscription, MockDeviceConfigPusher::new());

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        // Cancelling mid-backoff stops the loop well before the full
        // one-second pull-error delay elapses.
        let start = std::time::Instant::now();
        assert!(consumer.run(ctx).await.is_ok());
        assert!(start.elapsed() < Duration::from_millis(800));
    }
}
