//! REST client for the device-management API.
//!
//! Wraps the single RPC this service needs: pushing a configuration blob
//! to a device (`modifyCloudToDeviceConfig`) using [`reqwest`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use fanctl_domain::{
    AuthProvider, DeviceAddress, DeviceConfigPusher, DomainError, DomainResult, FanConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Config version sentinel meaning "always apply": the API performs no
/// optimistic-concurrency check against the device's current config
/// version and the last write wins.
const VERSION_ALWAYS_APPLY: u64 = 0;

pub struct DeviceConfigClientConfig {
    /// Base HTTP URL of the device-management API, e.g.
    /// `https://cloudiot.googleapis.com/v1beta1`.
    pub base_url: String,
    /// API key sent as the `key` query parameter on every request.
    pub api_key: String,
    /// Per-request timeout so one slow device cannot stall a whole batch.
    pub request_timeout: Duration,
}

/// HTTP client for device configuration updates. Long-lived and
/// thread-safe; constructed once and shared across per-message work.
pub struct DeviceConfigClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth: Arc<dyn AuthProvider>,
}

impl DeviceConfigClient {
    pub fn new(config: DeviceConfigClientConfig, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build device-management HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            auth,
        })
    }

    fn modify_config_url(&self, address: &DeviceAddress) -> String {
        format!(
            "{}/{}:modifyCloudToDeviceConfig?key={}",
            self.base_url,
            address.device_path(),
            self.api_key
        )
    }

    /// Issue the update request. One outbound call, no internal retries;
    /// auth, not-found and transport failures all surface as the error.
    async fn modify_device_config(
        &self,
        address: &DeviceAddress,
        body: serde_json::Value,
    ) -> Result<()> {
        let token = self
            .auth
            .bearer_token()
            .await
            .context("Failed to obtain bearer token")?;

        let response = self
            .client
            .post(self.modify_config_url(address))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Device config request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            anyhow::bail!(
                "Device-management API error ({}) for {}: {}",
                status.as_u16(),
                address.device_path(),
                body
            );
        }

        debug!(device = %address.device_path(), "device config updated");
        Ok(())
    }
}

/// Build the update-request body: the directive serialized as JSON, then
/// carried as an opaque base64 blob. The device receives the decoded JSON.
fn config_update_body(config: &FanConfig) -> Result<serde_json::Value> {
    let config_json = serde_json::to_vec(config).context("Failed to encode fan config")?;

    Ok(serde_json::json!({
        "version_to_update": VERSION_ALWAYS_APPLY,
        "data": {
            "binary_data": BASE64.encode(config_json),
        },
    }))
}

#[async_trait]
impl DeviceConfigPusher for DeviceConfigClient {
    async fn push_config(&self, address: &DeviceAddress, config: &FanConfig) -> DomainResult<()> {
        let body = config_update_body(config).map_err(DomainError::ConfigError)?;
        self.modify_device_config(address, body)
            .await
            .map_err(DomainError::ConfigError)
    }
}
