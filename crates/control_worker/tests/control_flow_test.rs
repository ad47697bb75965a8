//! End-to-end control-flow tests over the consumer loop with mocked
//! queue and device-management boundaries.

use control_worker::{ControlWorker, ControlWorkerConfig};
use fanctl_domain::{
    AckHandle, DeviceAddress, FanConfig, MockDeviceConfigPusher, MockTelemetrySubscription,
    TelemetryMessage, ATTR_DEVICE_ID, ATTR_PROJECT_ID, ATTR_REGISTRY_ID, ATTR_REGISTRY_LOCATION,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn telemetry_message(ack_id: &str, payload: &[u8]) -> TelemetryMessage {
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

async fn run_worker(
    subscription: MockTelemetrySubscription,
    pusher: MockDeviceConfigPusher,
) {
    let worker = ControlWorker::new(
        Arc::new(subscription),
        Arc::new(pusher),
        ControlWorkerConfig { batch_size: 30 },
    );

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    worker
        .into_runner_process()(ctx)
        .await
        .expect("consumer loop should stop cleanly");
}

#[tokio::test]
async fn cold_reading_updates_device_and_acknowledges() {
    let mut subscription = MockTelemetrySubscription::new();
    // First pull delivers one cold reading, later pulls are empty.
    subscription
        .expect_pull()
        .times(1)
        .return_once(|_| Ok(vec![telemetry_message("m1", br#"{"temperature": -5}"#)]));
    subscription.expect_pull().returning(|_| Ok(Vec::new()));
    subscription
        .expect_acknowledge()
        .withf(|handles: &[AckHandle]| handles.len() == 1 && handles[0].as_str() == "m1")
        .times(1)
        .returning(|_| Ok(()));

    let mut pusher = MockDeviceConfigPusher::new();
    pusher
        .expect_push_config()
        .withf(|address: &DeviceAddress, config: &FanConfig| {
            address.device_path() == "projects/p1/locations/us-central1/registries/r1/devices/d1"
                && !config.fan_on
        })
        .times(1)
        .returning(|_, _| Ok(()));

    run_worker(subscription, pusher).await;
}

#[tokio::test]
async fn in_range_reading_acknowledges_without_remote_call() {
    let mut subscription = MockTelemetrySubscription::new();
    subscription
        .expect_pull()
        .times(1)
        .return_once(|_| Ok(vec![telemetry_message("m2", br#"{"temperature": 5}"#)]));
    subscription.expect_pull().returning(|_| Ok(Vec::new()));
    subscription
        .expect_acknowledge()
        .withf(|handles: &[AckHandle]| handles.len() == 1 && handles[0].as_str() == "m2")
        .times(1)
        .returning(|_| Ok(()));

    // The pusher expects no calls at all.
    let pusher = MockDeviceConfigPusher::new();

    run_worker(subscription, pusher).await;
}

#[tokio::test]
async fn pull_error_does_not_stop_the_loop() {
    let mut subscription = MockTelemetrySubscription::new();
    subscription
        .expect_pull()
        .times(1)
        .return_once(|_| Err(anyhow::anyhow!("transient transport error")));
    subscription.expect_pull().returning(|_| Ok(Vec::new()));
    subscription.expect_acknowledge().times(0);

    let pusher = MockDeviceConfigPusher::new();

    // The loop backs off after the pull error and keeps running until
    // cancelled; reaching the clean stop is the assertion.
    let worker = ControlWorker::new(
        Arc::new(subscription),
        Arc::new(pusher),
        ControlWorkerConfig { batch_size: 30 },
    );

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        // Fires during the post-error backoff; cancellation interrupts
        // the backoff instead of waiting it out.
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    worker
        .into_runner_process()(ctx)
        .await
        .expect("consumer loop should stop cleanly");
}
