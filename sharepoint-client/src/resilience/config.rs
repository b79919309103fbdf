//! Client-wide configuration

use std::time::Duration;

use super::retry::RetryConfig;

/// Flat configuration for the client, constructed up front.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub retry: RetryConfig,
    /// Per-request timeout enforced by the transport.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(100),
            user_agent: format!("sharepoint-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Config for tests: no retries, short timeout.
    pub fn disabled_resilience() -> Self {
        Self {
            retry: RetryConfig::disabled(),
            timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }
}
