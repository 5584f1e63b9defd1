//! Traits describing provider capabilities and shared error types.

use async_trait::async_trait;
use chrono::ParseError as ChronoParseError;
use reqwest::{Error as ReqwestError, StatusCode};
use serde_json::Error as JsonError;
use tokio::task::JoinError;

use crate::model::{Point, ProviderMeta, ProviderTag, Sensor};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Provider answered with a non-success status.
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(StatusCode),
    /// Payload was not the JSON we expected.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
    /// Failed to parse a timestamp from the provider response.
    #[error("Date parse error: {0}")]
    Date(#[from] ChronoParseError),
    /// A scraped page no longer contains the expected fragment.
    #[error("Pattern not found: {0}")]
    PatternNotFound(&'static str),
    /// Payload matched structurally but carried unusable content.
    #[error("Malformed payload: {0}")]
    Malformed(String),
    /// Provider did not answer within its deadline.
    #[error("Provider {0} timed out")]
    Timeout(ProviderTag),
    /// A provider task panicked or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    /// The provider has no registered plugin.
    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderTag),
}

#[async_trait]
/// Trait for provider-specific sensor backends.
pub trait SensorPort: Send + Sync {
    /// Metadata describing the provider handled by this port.
    fn meta(&self) -> &ProviderMeta;

    /// Discover stations around `center`, keep those closer than `radius_m`, and
    /// resolve a PM2.5 value for each.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when discovery fails; per-station failures degrade
    /// to an unknown value instead.
    async fn fetch(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError>;
}

/// Out-of-band sink for failures that were absorbed instead of propagated.
pub trait ErrorReporter: Send + Sync {
    /// Record a degraded outcome. `context` names where it happened.
    fn report(&self, context: &str, error: &PortError);

    /// Drain anything buffered before the process exits.
    fn flush(&self) {}
}
