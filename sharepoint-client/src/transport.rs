//! HTTP transport collaborator
//!
//! The coordinator hands a fully built physical request to the transport and
//! gets back status/headers/body or a transport-level failure. The reqwest
//! implementation owns token injection and the throttling retry loop;
//! everything above it treats a request as a single send.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::auth::TokenProvider;
use crate::error::TransportError;
use crate::protocol::Protocol;
use crate::resilience::ClientConfig;

/// One physical HTTP call description.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub protocol: Protocol,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn new(protocol: Protocol, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            protocol,
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Scheme + host part of the url, used as the token resource.
    pub fn resource(&self) -> &str {
        match self.url.find("://") {
            Some(scheme_end) => {
                let rest = &self.url[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) => &self.url[..scheme_end + 3 + path_start],
                    None => &self.url,
                }
            }
            None => &self.url,
        }
    }
}

/// Raw physical response. Non-2xx statuses are returned, not mapped: whether
/// a status is a failure is the response mapper's call.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the actual HTTP call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with bearer-token injection and incremental
/// backoff on throttling.
pub struct HttpTransport {
    client: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(auth: Arc<dyn TokenProvider>, config: ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            client,
            auth,
            config,
        })
    }

    async fn send_once(
        &self,
        request: &TransportRequest,
        token: &str,
    ) -> Result<TransportResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .bearer_auth(token);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.config.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let retry = &self.config.retry;
        let token = self.auth.access_token(request.resource()).await?;

        let mut attempt = 1u32;
        loop {
            debug!(
                "{} {} {} (attempt {}/{})",
                request.protocol,
                request.method,
                request.url,
                attempt,
                retry.max_attempts
            );

            match self.send_once(&request, &token).await {
                Ok(response) => {
                    if !crate::resilience::RetryConfig::is_retryable_status(response.status) {
                        return Ok(response);
                    }
                    if attempt >= retry.max_attempts {
                        return Err(TransportError::ThrottleExhausted {
                            attempts: attempt,
                        });
                    }
                    let delay = retry_after(&response)
                        .unwrap_or_else(|| retry.delay_for_attempt(attempt + 1));
                    warn!(
                        "throttled with {} on {}, backing off {:?}",
                        response.status, request.url, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(TransportError::Timeout(timeout)) => {
                    if attempt >= retry.max_attempts {
                        return Err(TransportError::Timeout(timeout));
                    }
                    let delay = retry.delay_for_attempt(attempt + 1);
                    warn!("timeout on {}, backing off {:?}", request.url, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
            attempt += 1;
        }
    }
}

/// Server-suggested backoff in seconds, when present.
fn retry_after(response: &TransportResponse) -> Option<Duration> {
    response
        .headers
        .get("retry-after")
        .or_else(|| response.headers.get("Retry-After"))
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_extraction() {
        let request = TransportRequest::new(
            Protocol::Rest,
            "GET",
            "https://contoso.sharepoint.com/sites/dev/_api/web",
        );
        assert_eq!(request.resource(), "https://contoso.sharepoint.com");

        let bare = TransportRequest::new(Protocol::Graph, "GET", "https://graph.microsoft.com");
        assert_eq!(bare.resource(), "https://graph.microsoft.com");
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HashMap::new();
        headers.insert("retry-after".to_string(), "7".to_string());
        let response = TransportResponse {
            status: 429,
            headers,
            body: String::new(),
        };
        assert_eq!(retry_after(&response), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_success_statuses() {
        let response = TransportResponse {
            status: 204,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert!(response.is_success());
    }
}
