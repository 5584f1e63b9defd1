//! Domain data structures for positions, providers, and normalized readings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Geographic position in decimal degrees (WGS-84).
pub struct Point {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Point {
    /// Construct a point from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// Air quality data providers known to smogmap.
pub enum ProviderTag {
    /// Wrocław University of Science and Technology sensor map.
    Pwr,
    /// Chief Inspectorate of Environmental Protection (GIOŚ).
    Gios,
    /// Airly sensor network.
    Airly,
    /// `LookO2` sensor network.
    Looko2,
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            ProviderTag::Pwr => "PWR",
            ProviderTag::Gios => "GIOS",
            ProviderTag::Airly => "AIRLY",
            ProviderTag::Looko2 => "LOOKO2",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Attribution metadata describing a provider.
pub struct ProviderMeta {
    /// Provider identifier.
    pub tag: ProviderTag,
    /// Human-friendly name.
    pub name: String,
    /// Public page of the data source.
    pub homepage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// PM2.5 reading normalized across all providers.
pub struct Sensor {
    /// Latitude of the station.
    pub lat: f64,
    /// Longitude of the station.
    pub lon: f64,
    /// Concentration in µg/m³, `None` when the station has no current reading.
    pub value: Option<f64>,
    /// Provider the reading came from.
    pub source: ProviderTag,
}

impl Sensor {
    /// Build a reading located at `point`.
    #[must_use]
    pub const fn new(point: Point, value: Option<f64>, source: ProviderTag) -> Self {
        Self {
            lat: point.lat,
            lon: point.lon,
            value,
            source,
        }
    }

    /// Position of the station.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Deserialize a coordinate that providers send either as a number or a numeric string.
///
/// Unparseable text yields `None` so the candidate can be dropped instead of failing
/// the whole payload.
///
/// # Errors
///
/// Returns an error when the value is neither a number, a string, nor null.
pub fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(raw.and_then(|coordinate| match coordinate {
        NumberOrText::Number(number) => Some(number),
        NumberOrText::Text(text) => text.trim().parse().ok(),
    }))
}
