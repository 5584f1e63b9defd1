//! High-level service facade fanning out over all providers.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::fallback::with_fallback;
use crate::model::{Point, ProviderMeta, ProviderTag, Sensor};
use crate::plugin::PluginRegistry;
use crate::ports::{ErrorReporter, PortError};

/// Default time a single provider may take before it is treated as failed.
pub const DEFAULT_PROVIDER_DEADLINE: Duration = Duration::from_secs(15);

/// Public entry point for aggregated air quality queries.
pub struct SmogService {
    registry: Arc<PluginRegistry>,
    reporter: Arc<dyn ErrorReporter>,
    deadline: Duration,
}

impl SmogService {
    /// Create a new service bound to the provided registry and reporter.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            registry,
            reporter,
            deadline: DEFAULT_PROVIDER_DEADLINE,
        }
    }

    /// Override the per-provider deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// List all registered providers.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.registry.providers()
    }

    /// Query every provider concurrently and concatenate their readings.
    ///
    /// Each provider runs in its own task, bounded by the deadline and wrapped in
    /// [`with_fallback`], so a failing provider contributes nothing instead of
    /// failing the request. A provider task that panics is reported and counts
    /// as empty as well. Results are concatenated in registry order.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Join`] when a provider task is cancelled by the runtime.
    pub async fn aggregate(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError> {
        let (tags, tasks): (Vec<ProviderTag>, Vec<_>) = self
            .registry
            .ports()
            .map(|port| {
                let port = Arc::clone(port);
                let reporter = Arc::clone(&self.reporter);
                let deadline = self.deadline;
                let tag = port.meta().tag;

                let task = tokio::spawn(async move {
                    let bounded = async {
                        tokio::time::timeout(deadline, port.fetch(center, radius_m))
                            .await
                            .unwrap_or(Err(PortError::Timeout(tag)))
                    };
                    let sensors = with_fallback(
                        &format!("{tag} provider"),
                        bounded,
                        Vec::new(),
                        reporter.as_ref(),
                    )
                    .await;
                    tracing::debug!(provider = %tag, count = sensors.len(), "provider settled");
                    sensors
                });
                (tag, task)
            })
            .unzip();

        let mut sensors = Vec::new();
        for (tag, joined) in tags.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(batch) => sensors.extend(batch),
                Err(join_err) if join_err.is_panic() => {
                    tracing::warn!(provider = %tag, "provider task panicked");
                    self.reporter
                        .report(&format!("{tag} provider"), &PortError::from(join_err));
                }
                Err(join_err) => {
                    let err = PortError::from(join_err);
                    self.reporter.report("aggregate", &err);
                    return Err(err);
                }
            }
        }

        tracing::info!(
            lat = center.lat,
            lon = center.lon,
            radius_m,
            count = sensors.len(),
            "aggregated readings"
        );
        Ok(sensors)
    }
}
