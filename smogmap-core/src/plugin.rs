//! Registry for all provider plugins and their ports.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{ProviderMeta, ProviderTag};
use crate::ports::{PortError, SensorPort};

/// Port implementing a single upstream data source.
pub struct ProviderPlugin {
    /// Static metadata describing the provider.
    pub meta: ProviderMeta,
    /// Implementation for fetching readings.
    pub port: Arc<dyn SensorPort>,
}

impl ProviderPlugin {
    /// Bundle a port with its own metadata.
    #[must_use]
    pub fn new(port: Arc<dyn SensorPort>) -> Self {
        Self {
            meta: port.meta().clone(),
            port,
        }
    }
}

/// Registry that resolves plugins by provider tag.
///
/// Iteration is ordered by tag, which fixes the order in which aggregated
/// results are concatenated.
pub struct PluginRegistry {
    plugins: BTreeMap<ProviderTag, ProviderPlugin>,
}

impl PluginRegistry {
    /// Build a registry from the provided plugin list.
    ///
    /// A later plugin replaces an earlier one carrying the same tag.
    #[must_use]
    pub fn new(plugins: Vec<ProviderPlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.meta.tag, plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Return metadata for all registered providers.
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderMeta> {
        self.plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect()
    }

    /// Iterator over every registered port.
    pub fn ports(&self) -> impl Iterator<Item = &Arc<dyn SensorPort>> {
        self.plugins.values().map(|plugin| &plugin.port)
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Look up a plugin for the given provider.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownProvider`] when no plugin is registered.
    pub fn plugin(&self, tag: ProviderTag) -> Result<&ProviderPlugin, PortError> {
        self.plugins.get(&tag).ok_or(PortError::UnknownProvider(tag))
    }
}
