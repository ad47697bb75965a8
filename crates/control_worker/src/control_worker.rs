use crate::consumer::TelemetryConsumer;
use fanctl_domain::{DeviceControlService, DeviceConfigPusher, TelemetrySubscription};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ControlWorkerConfig {
    /// Maximum messages pulled per cycle; also bounds per-batch
    /// processing concurrency.
    pub batch_size: usize,
}

/// Wires the device-control pipeline: subscription in, config pushes out.
pub struct ControlWorker {
    consumer: TelemetryConsumer,
}

impl ControlWorker {
    pub fn new(
        subscription: Arc<dyn TelemetrySubscription>,
        pusher: Arc<dyn DeviceConfigPusher>,
        config: ControlWorkerConfig,
    ) -> Self {
        info!("Initializing control worker");

        let service = Arc::new(DeviceControlService::new(pusher));
        let consumer = TelemetryConsumer::new(subscription, service, config.batch_size);

        Self { consumer }
    }

    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            )
                -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
            + Send,
    > {
        Box::new({
            let consumer = self.consumer;
            move |ctx| Box::pin(async move { consumer.run(ctx).await })
        })
    }
}
