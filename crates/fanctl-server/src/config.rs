use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Service configuration, read from `FANCTL_`-prefixed environment
/// variables. Fields without a default are required at startup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Cloud project that owns the queue and device registry
    pub project_id: String,

    /// Topic the devices publish telemetry to (informational, the worker
    /// only touches the subscription)
    #[serde(default = "default_pubsub_topic")]
    pub pubsub_topic: String,

    /// Subscription the worker pulls telemetry from
    pub pubsub_subscription: String,

    /// API key for the device-management API
    pub api_key: String,

    /// Path to the file holding the bearer credential
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,

    /// Base URL of the queue API
    #[serde(default = "default_pubsub_base_url")]
    pub pubsub_base_url: String,

    /// Base URL of the device-management API
    #[serde(default = "default_iot_base_url")]
    pub iot_base_url: String,

    /// Maximum messages pulled per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Client-side bound on the long-poll pull call in seconds
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,

    /// Per-request timeout for device config pushes in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Time allowed for cleanup tasks on shutdown in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pubsub_topic() -> String {
    "device-events".to_string()
}

fn default_credentials_file() -> String {
    "service_account.json".to_string()
}

fn default_pubsub_base_url() -> String {
    "https://pubsub.googleapis.com/v1".to_string()
}

fn default_iot_base_url() -> String {
    "https://cloudiot.googleapis.com/v1beta1".to_string()
}

fn default_batch_size() -> usize {
    30
}

fn default_pull_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "fanctl-server".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FANCTL"))
            .build()?
            .try_deserialize()
    }
}
