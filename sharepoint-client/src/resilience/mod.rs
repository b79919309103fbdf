//! Resilience and client configuration
//!
//! Flat configuration structs constructed up front and passed by value.
//! Retry only applies at the transport level, to throttling and timeouts.

pub mod config;
pub mod retry;

pub use config::ClientConfig;
pub use retry::RetryConfig;
