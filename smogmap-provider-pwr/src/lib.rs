//! Provider implementation for the PWr sensor map.
//!
//! The page has no API. It is a generated Leaflet map whose initialization script
//! declares every marker, popup and iframe as a separate variable, so readings are
//! recovered by extracting four kinds of script lines into lookup tables and then
//! walking `marker -> popup -> iframe -> base64 body` for each marker.
//!
//! This is tied to the exact text the page generator emits. When the layout
//! changes the adapter finds nothing and returns no readings.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;
use reqwest::Client;

use smogmap_core::{
    geo::within_radius,
    http::{fetch_text, skip_on_status},
    model::{Point, ProviderMeta, ProviderTag, Sensor},
    plugin::ProviderPlugin,
    ports::{ErrorReporter, PortError, SensorPort},
};

/// Default page location.
pub const PAGE_URL: &str = "https://czujniki-pwr.kdm.wcss.pl/smog.html";

/// Whitespace after the last `(` of a line, so `L.marker(\n  [lat, lon]` joins up.
static OPEN_PAREN_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)\(\s*").expect("valid collapse regex"));

static MARKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\smarker_(\w+)\s=.*\[(.*),\s*(.*)\]").expect("valid marker regex")
});

static IFRAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"var\si_frame_(\w+)\s=\s.*?base64,(.*?)""#).expect("valid iframe regex")
});

static POPUP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"popup_(\w+)\.setContent\(i_frame_(\w+)\)").expect("valid popup regex")
});

static BINDING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"marker_(\w+)\.bindPopup\(popup_(\w+)\)").expect("valid binding regex")
});

static POPUP_READING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">(\d+)\s.*?µg/m").expect("valid reading regex"));

#[derive(Debug, Clone, PartialEq)]
struct Marker {
    id: String,
    point: Point,
}

/// Tables extracted from one copy of the page.
#[derive(Debug, Default)]
struct ScrapeGraph {
    /// Markers in page order.
    markers: Vec<Marker>,
    /// iframe id -> base64 popup body.
    iframes: HashMap<String, String>,
    /// popup id -> iframe id.
    popups: HashMap<String, String>,
    /// marker id -> popup id.
    bindings: HashMap<String, String>,
}

impl ScrapeGraph {
    fn parse(page: &str) -> Self {
        let page = OPEN_PAREN_WHITESPACE.replace_all(page, "${1}(");

        Self {
            markers: extract_markers(&page),
            iframes: extract_pairs(&IFRAME_LINE, &page),
            popups: extract_pairs(&POPUP_LINE, &page),
            bindings: extract_pairs(&BINDING_LINE, &page),
        }
    }

    /// Encoded popup body reachable from a marker, if every hop exists.
    fn popup_body(&self, marker_id: &str) -> Option<&str> {
        let popup_id = self.bindings.get(marker_id)?;
        let iframe_id = self.popups.get(popup_id)?;
        self.iframes.get(iframe_id).map(String::as_str)
    }

    /// Reading shown in a marker's popup.
    ///
    /// A broken link is a missing reading, not an error.
    fn marker_value(&self, marker_id: &str) -> Result<Option<f64>, PortError> {
        let Some(encoded) = self.popup_body(marker_id) else {
            tracing::debug!(marker_id, "PWR marker has no popup chain");
            return Ok(None);
        };
        decode_reading(encoded).map(Some)
    }
}

fn extract_markers(page: &str) -> Vec<Marker> {
    MARKER_LINE
        .captures_iter(page)
        .filter_map(|captures| {
            let id = captures.get(1)?.as_str();
            let lat = captures.get(2)?.as_str().trim().parse().ok()?;
            let lon = captures.get(3)?.as_str().trim().parse().ok()?;
            Some(Marker {
                id: id.to_owned(),
                point: Point::new(lat, lon),
            })
        })
        .collect()
}

fn extract_pairs(pattern: &Regex, page: &str) -> HashMap<String, String> {
    pattern
        .captures_iter(page)
        .filter_map(|captures| {
            Some((
                captures.get(1)?.as_str().to_owned(),
                captures.get(2)?.as_str().to_owned(),
            ))
        })
        .collect()
}

fn decode_reading(encoded: &str) -> Result<f64, PortError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| PortError::Malformed(format!("popup body is not base64: {err}")))?;
    let body = String::from_utf8_lossy(&bytes);

    POPUP_READING
        .captures(&body)
        .and_then(|captures| captures.get(1))
        .and_then(|reading| reading.as_str().parse().ok())
        .ok_or(PortError::PatternNotFound("popup µg/m³ reading"))
}

/// Settings for the PWr provider.
#[derive(Debug, Clone)]
pub struct PwrConfig {
    /// Location of the map page.
    pub page_url: String,
}

impl Default for PwrConfig {
    fn default() -> Self {
        Self {
            page_url: PAGE_URL.to_owned(),
        }
    }
}

/// Sensor port scraping the PWr map page.
pub struct PwrSensorPort {
    client: Client,
    meta: ProviderMeta,
    page_url: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl PwrSensorPort {
    /// Create a new port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: PwrConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            page_url: config.page_url,
            reporter,
        }
    }

    fn resolve(&self, graph: &ScrapeGraph, center: Point, radius_m: f64) -> Vec<Sensor> {
        let nearby = within_radius(graph.markers.clone(), center, radius_m, |marker| {
            marker.point
        });

        nearby
            .into_iter()
            .map(|marker| {
                let value = graph.marker_value(&marker.id).unwrap_or_else(|err| {
                    self.reporter
                        .report(&format!("PWR marker {}", marker.id), &err);
                    None
                });
                Sensor::new(marker.point, value, ProviderTag::Pwr)
            })
            .collect()
    }
}

#[async_trait]
impl SensorPort for PwrSensorPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError> {
        let page = fetch_text(self.client.get(&self.page_url)).await;
        let Some(page) = skip_on_status(page, "PWR page", self.reporter.as_ref())? else {
            return Ok(Vec::new());
        };

        let graph = ScrapeGraph::parse(&page);
        if graph.markers.is_empty() {
            self.reporter
                .report("PWR page", &PortError::PatternNotFound("map markers"));
            return Ok(Vec::new());
        }
        tracing::debug!(
            markers = graph.markers.len(),
            iframes = graph.iframes.len(),
            popups = graph.popups.len(),
            bindings = graph.bindings.len(),
            "PWR page scraped"
        );

        Ok(self.resolve(&graph, center, radius_m))
    }
}

/// Build the plugin bundle for the PWr provider.
#[must_use]
pub fn plugin(client: Client, config: PwrConfig, reporter: Arc<dyn ErrorReporter>) -> ProviderPlugin {
    ProviderPlugin::new(Arc::new(PwrSensorPort::new(client, config, reporter)))
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        tag: ProviderTag::Pwr,
        name: String::from("Politechnika Wrocławska"),
        homepage: String::from("https://czujniki-pwr.kdm.wcss.pl"),
    }
}
