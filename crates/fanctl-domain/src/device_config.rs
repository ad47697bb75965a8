use crate::decision::FanConfig;
use crate::error::DomainResult;
use crate::message::DeviceAddress;
use async_trait::async_trait;

/// Boundary to the remote device-management API.
///
/// Implementations push the desired configuration with always-apply
/// semantics (last write wins), so repeated pushes of the same directive
/// are harmless. No internal retries; retry policy belongs to the queue
/// redelivery loop.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceConfigPusher: Send + Sync {
    /// Push the configuration to the addressed device. Called only when a
    /// directive was actually produced for the message.
    async fn push_config(&self, address: &DeviceAddress, config: &FanConfig) -> DomainResult<()>;
}
