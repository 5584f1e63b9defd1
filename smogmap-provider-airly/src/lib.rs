//! Provider implementation for the Airly sensor network.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;

use smogmap_core::{
    fallback::with_fallback,
    geo::{bounding_box, within_radius},
    http::{fetch_json, skip_on_status},
    model::{Point, ProviderMeta, ProviderTag, Sensor, lenient_coordinate},
    plugin::ProviderPlugin,
    ports::{ErrorReporter, PortError, SensorPort},
};

/// Default API root.
pub const BASE_URL: &str = "https://airapi.airly.eu/v2";

const PM25_NAME: &str = "PM25";

/// Response from /markers
#[derive(Debug, Deserialize)]
struct MarkersResponse {
    markers: Vec<MarkerEntry>,
}

#[derive(Debug, Deserialize)]
struct MarkerEntry {
    id: i64,
    location: Location,
    #[serde(rename = "hasData", default)]
    has_data: bool,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default, deserialize_with = "lenient_coordinate")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    longitude: Option<f64>,
}

/// Response from /measurements/installation
#[derive(Debug, Deserialize)]
struct MeasurementsResponse {
    current: CurrentMeasurements,
    // history and forecast are also present, only "current" matters here
}

#[derive(Debug, Deserialize)]
struct CurrentMeasurements {
    #[serde(default)]
    values: Vec<NamedValue>,
}

#[derive(Debug, Deserialize)]
struct NamedValue {
    name: String,
    value: Option<f64>,
}

#[derive(Debug)]
struct Installation {
    id: i64,
    point: Point,
}

impl MarkerEntry {
    fn into_installation(self) -> Option<Installation> {
        if !self.has_data {
            return None;
        }
        Some(Installation {
            id: self.id,
            point: Point::new(self.location.latitude?, self.location.longitude?),
        })
    }
}

/// Settings for the Airly provider.
#[derive(Debug, Clone)]
pub struct AirlyConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Key sent as the `apikey` query parameter.
    pub api_key: String,
}

impl Default for AirlyConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
            api_key: String::new(),
        }
    }
}

/// Sensor port backed by the Airly REST API.
pub struct AirlySensorPort {
    client: Client,
    meta: ProviderMeta,
    config: AirlyConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl AirlySensorPort {
    /// Create a new port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: AirlyConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            config,
            reporter,
        }
    }

    async fn installation_value(&self, installation_id: i64) -> Result<Option<f64>, PortError> {
        let installation_id = installation_id.to_string();
        let measurements = fetch_json::<MeasurementsResponse>(
            self.client
                .get(format!("{}/measurements/installation", self.config.base_url))
                .query(&[
                    ("installationId", installation_id.as_str()),
                    ("apikey", self.config.api_key.as_str()),
                ]),
        )
        .await?;

        Ok(pm25_value(measurements.current.values))
    }
}

#[async_trait]
impl SensorPort for AirlySensorPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError> {
        // A square of side 2r is the smallest box containing the query circle.
        let bbox = bounding_box(center, 2.0 * radius_m);

        let listing = fetch_json::<MarkersResponse>(
            self.client
                .get(format!("{}/markers", self.config.base_url))
                .query(&[
                    ("swLat", bbox.lat_min.to_string()),
                    ("swLng", bbox.lon_min.to_string()),
                    ("neLat", bbox.lat_max.to_string()),
                    ("neLng", bbox.lon_max.to_string()),
                    ("apikey", self.config.api_key.clone()),
                ]),
        )
        .await;
        let Some(response) = skip_on_status(listing, "AIRLY discovery", self.reporter.as_ref())?
        else {
            return Ok(Vec::new());
        };

        let installations: Vec<Installation> = response
            .markers
            .into_iter()
            .filter_map(MarkerEntry::into_installation)
            .collect();
        let nearby = within_radius(installations, center, radius_m, |installation| {
            installation.point
        });
        tracing::debug!(count = nearby.len(), "AIRLY installations in radius");

        let sensors = join_all(nearby.iter().map(|installation| async move {
            let value = with_fallback(
                &format!("AIRLY installation {}", installation.id),
                self.installation_value(installation.id),
                None,
                self.reporter.as_ref(),
            )
            .await;
            Sensor::new(installation.point, value, ProviderTag::Airly)
        }))
        .await;

        Ok(sensors)
    }
}

/// Build the plugin bundle for the Airly provider.
#[must_use]
pub fn plugin(client: Client, config: AirlyConfig, reporter: Arc<dyn ErrorReporter>) -> ProviderPlugin {
    ProviderPlugin::new(Arc::new(AirlySensorPort::new(client, config, reporter)))
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        tag: ProviderTag::Airly,
        name: String::from("Airly"),
        homepage: String::from("https://airly.org"),
    }
}

fn pm25_value(values: Vec<NamedValue>) -> Option<f64> {
    values
        .into_iter()
        .find(|entry| entry.name == PM25_NAME)
        .and_then(|entry| entry.value)
}
