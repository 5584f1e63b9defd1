//! Provider implementation scraping the `LookO2` heatmap and tracker pages.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use smogmap_core::{
    fallback::with_fallback,
    geo::within_radius,
    http::{fetch_text, skip_on_status},
    model::{Point, ProviderMeta, ProviderTag, Sensor, lenient_coordinate},
    plugin::ProviderPlugin,
    ports::{ErrorReporter, PortError, SensorPort},
};

/// Default site root.
pub const BASE_URL: &str = "https://looko2.com";

/// The heatmap page assigns every device to a single script variable.
static HEATMAP_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\sjsonData\s=\s'(.*)';").expect("valid heatmap regex"));

static TRACKER_PM25: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PM2\.5.*?(\d+)\sug/m3\s").expect("valid tracker regex")
});

/// Device entry inside the heatmap blob.
#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(rename = "Device")]
    device: String,
    #[serde(rename = "Lat", default, deserialize_with = "lenient_coordinate")]
    lat: Option<f64>,
    #[serde(rename = "Lon", default, deserialize_with = "lenient_coordinate")]
    lon: Option<f64>,
}

#[derive(Debug)]
struct Device {
    id: String,
    point: Point,
}

impl DeviceEntry {
    fn into_device(self) -> Option<Device> {
        Some(Device {
            point: Point::new(self.lat?, self.lon?),
            id: self.device,
        })
    }
}

/// Settings for the `LookO2` provider.
#[derive(Debug, Clone)]
pub struct Looko2Config {
    /// Site root, without trailing slash.
    pub base_url: String,
}

impl Default for Looko2Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
        }
    }
}

/// Sensor port scraping the `LookO2` website.
pub struct Looko2SensorPort {
    client: Client,
    meta: ProviderMeta,
    base_url: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl Looko2SensorPort {
    /// Create a new port bound to the given HTTP client.
    ///
    /// The upstream certificate chain is incomplete, so the client usually needs
    /// to accept invalid certificates.
    #[must_use]
    pub fn new(client: Client, config: Looko2Config, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            base_url: config.base_url,
            reporter,
        }
    }

    async fn device_value(&self, device: &str) -> Result<Option<f64>, PortError> {
        let page = fetch_text(
            self.client
                .get(format!("{}/tracker.php", self.base_url))
                .query(&[("lan", ""), ("search", device)]),
        )
        .await?;

        tracker_value(&page)
            .map(Some)
            .ok_or(PortError::PatternNotFound("tracker PM2.5 reading"))
    }
}

#[async_trait]
impl SensorPort for Looko2SensorPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError> {
        let heatmap =
            fetch_text(self.client.get(format!("{}/heatmap.php", self.base_url))).await;
        let Some(page) = skip_on_status(heatmap, "LOOKO2 discovery", self.reporter.as_ref())?
        else {
            return Ok(Vec::new());
        };

        let devices = parse_heatmap(&page)?;
        let nearby = within_radius(devices, center, radius_m, |device| device.point);
        tracing::debug!(count = nearby.len(), "LOOKO2 devices in radius");

        let sensors = join_all(nearby.iter().map(|device| async move {
            let value = with_fallback(
                &format!("LOOKO2 device {}", device.id),
                self.device_value(&device.id),
                None,
                self.reporter.as_ref(),
            )
            .await;
            Sensor::new(device.point, value, ProviderTag::Looko2)
        }))
        .await;

        Ok(sensors)
    }
}

/// Build the plugin bundle for the `LookO2` provider.
#[must_use]
pub fn plugin(client: Client, config: Looko2Config, reporter: Arc<dyn ErrorReporter>) -> ProviderPlugin {
    ProviderPlugin::new(Arc::new(Looko2SensorPort::new(client, config, reporter)))
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        tag: ProviderTag::Looko2,
        name: String::from("LookO2"),
        homepage: String::from("https://looko2.com"),
    }
}

fn parse_heatmap(page: &str) -> Result<Vec<Device>, PortError> {
    let blob = HEATMAP_BLOB
        .captures(page)
        .and_then(|captures| captures.get(1))
        .ok_or(PortError::PatternNotFound("heatmap jsonData"))?;

    let entries: Vec<DeviceEntry> = serde_json::from_str(blob.as_str())?;

    Ok(entries
        .into_iter()
        .filter_map(DeviceEntry::into_device)
        .collect())
}

fn tracker_value(page: &str) -> Option<f64> {
    TRACKER_PM25
        .captures(page)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}
