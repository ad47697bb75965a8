mod config;
mod telemetry;

use config::ServiceConfig;
use control_worker::{ControlWorker, ControlWorkerConfig};
use fanctl_domain::StaticTokenProvider;
use fanctl_iot::{DeviceConfigClient, DeviceConfigClientConfig};
use fanctl_pubsub::{PubSubClient, PubSubClientConfig};
use fanctl_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{init_telemetry, OtelProviders, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let otel_providers: Option<OtelProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        project_id = %config.project_id,
        topic = %config.pubsub_topic,
        subscription = %config.pubsub_subscription,
        "Starting fanctl server"
    );

    let worker = match build_control_worker(&config) {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize control worker: {:#}", e);
            std::process::exit(1);
        }
    };

    Runner::new()
        .with_app_process(worker.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            if let Some(providers) = otel_providers {
                providers.shutdown();
            }
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .run()
        .await;
}

fn build_control_worker(config: &ServiceConfig) -> anyhow::Result<ControlWorker> {
    let auth = Arc::new(StaticTokenProvider::new(load_credentials(
        &config.credentials_file,
    )?));

    let subscription = PubSubClient::new(
        PubSubClientConfig {
            base_url: config.pubsub_base_url.clone(),
            project_id: config.project_id.clone(),
            subscription: config.pubsub_subscription.clone(),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        },
        auth.clone(),
    )?;

    let pusher = DeviceConfigClient::new(
        DeviceConfigClientConfig {
            base_url: config.iot_base_url.clone(),
            api_key: config.api_key.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        },
        auth,
    )?;

    Ok(ControlWorker::new(
        Arc::new(subscription),
        Arc::new(pusher),
        ControlWorkerConfig {
            batch_size: config.batch_size,
        },
    ))
}

/// Read the bearer credential from disk. Loaded once; the process must be
/// restarted to pick up rotated credentials.
fn load_credentials(path: &str) -> anyhow::Result<String> {
    let token = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read credentials file {}: {}", path, e))?;

    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("Credentials file {} is empty", path);
    }

    Ok(token)
}
