//! Authentication collaborator interface
//!
//! The engine only needs a bearer token per outgoing call; how tokens are
//! acquired (certificate, device code, managed identity) is someone else's
//! problem and lives behind this trait.

use async_trait::async_trait;

use crate::error::TransportError;

/// Supplies a bearer token for a resource (scheme + host of the target).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self, resource: &str) -> Result<String, TransportError>;
}

/// Fixed-token provider for tests and pre-acquired tokens.
#[derive(Debug, Clone)]
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
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _resource: &str) -> Result<String, TransportError> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_fixed_token() {
        let provider = StaticTokenProvider::new("token-a");
        let token = provider
            .access_token("https://contoso.sharepoint.com")
            .await
            .unwrap();
        assert_eq!(token, "token-a");
    }
}
