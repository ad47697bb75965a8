use anyhow::Result;
use async_trait::async_trait;

/// Capability supplying bearer tokens for outbound API calls.
///
/// Credential management itself is out of scope for this service; the
/// server loads whatever credential material it is given at startup and
/// hands the remote clients an implementation of this trait.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// Bearer token fixed for the process lifetime, loaded once at startup.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new("abc123");
        assert_eq!(provider.bearer_token().await.unwrap(), "abc123");
    }
}
