//! Provider implementation for the GIOŚ air quality monitoring API.

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;

use smogmap_core::{
    fallback::with_fallback,
    geo::within_radius,
    http::{fetch_json, skip_on_status},
    model::{Point, ProviderMeta, ProviderTag, Sensor, lenient_coordinate},
    plugin::ProviderPlugin,
    ports::{ErrorReporter, PortError, SensorPort},
};

/// Default API root.
// Plain HTTP only; the upstream TLS setup is too old for current clients.
pub const BASE_URL: &str = "http://api.gios.gov.pl/pjp-api/rest";

const PM25_CODE: &str = "PM2.5";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Station as returned by /station/findAll
#[derive(Debug, Deserialize)]
struct StationEntry {
    id: i64,
    #[serde(rename = "gegrLat", default, deserialize_with = "lenient_coordinate")]
    lat: Option<f64>,
    #[serde(rename = "gegrLon", default, deserialize_with = "lenient_coordinate")]
    lon: Option<f64>,
    // stationName, city and address exist but are not shown
}

/// Sensor as returned by /station/sensors/{stationId}
#[derive(Debug, Deserialize)]
struct SensorEntry {
    id: i64,
    param: SensorParam,
}

#[derive(Debug, Deserialize)]
struct SensorParam {
    #[serde(rename = "paramCode")]
    code: String,
}

/// Time series from /data/getData/{sensorId}
#[derive(Debug, Deserialize)]
struct DataResponse {
    values: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    date: String, // "YYYY-MM-DD HH:MM:SS"
    value: Option<f64>,
}

#[derive(Debug)]
struct Station {
    id: i64,
    point: Point,
}

impl StationEntry {
    fn into_station(self) -> Option<Station> {
        Some(Station {
            id: self.id,
            point: Point::new(self.lat?, self.lon?),
        })
    }
}

/// Settings for the GIOŚ provider.
#[derive(Debug, Clone)]
pub struct GiosConfig {
    /// API root, without trailing slash.
    pub base_url: String,
}

impl Default for GiosConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
        }
    }
}

/// Sensor port backed by the GIOŚ REST API.
pub struct GiosSensorPort {
    client: Client,
    meta: ProviderMeta,
    base_url: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl GiosSensorPort {
    /// Create a new port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, config: GiosConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            client,
            meta: provider_meta(),
            base_url: config.base_url,
            reporter,
        }
    }

    async fn station_value(&self, station_id: i64) -> Result<Option<f64>, PortError> {
        let sensors = fetch_json::<Vec<SensorEntry>>(
            self.client
                .get(format!("{}/station/sensors/{station_id}", self.base_url)),
        )
        .await?;

        let Some(pm25) = sensors.into_iter().find(|sensor| sensor.param.code == PM25_CODE) else {
            return Ok(None);
        };

        let data = fetch_json::<DataResponse>(
            self.client
                .get(format!("{}/data/getData/{}", self.base_url, pm25.id)),
        )
        .await?;

        latest_value(data.values)
    }
}

#[async_trait]
impl SensorPort for GiosSensorPort {
    fn meta(&self) -> &ProviderMeta {
        &self.meta
    }

    async fn fetch(&self, center: Point, radius_m: f64) -> Result<Vec<Sensor>, PortError> {
        let listing = fetch_json::<Vec<StationEntry>>(
            self.client.get(format!("{}/station/findAll", self.base_url)),
        )
        .await;
        let Some(entries) = skip_on_status(listing, "GIOS discovery", self.reporter.as_ref())?
        else {
            return Ok(Vec::new());
        };

        let stations: Vec<Station> = entries
            .into_iter()
            .filter_map(StationEntry::into_station)
            .collect();
        let nearby = within_radius(stations, center, radius_m, |station| station.point);
        tracing::debug!(count = nearby.len(), "GIOS stations in radius");

        let sensors = join_all(nearby.iter().map(|station| async move {
            let value = with_fallback(
                &format!("GIOS station {}", station.id),
                self.station_value(station.id),
                None,
                self.reporter.as_ref(),
            )
            .await;
            Sensor::new(station.point, value, ProviderTag::Gios)
        }))
        .await;

        Ok(sensors)
    }
}

/// Build the plugin bundle for the GIOŚ provider.
#[must_use]
pub fn plugin(client: Client, config: GiosConfig, reporter: Arc<dyn ErrorReporter>) -> ProviderPlugin {
    ProviderPlugin::new(Arc::new(GiosSensorPort::new(client, config, reporter)))
}

fn provider_meta() -> ProviderMeta {
    ProviderMeta {
        tag: ProviderTag::Gios,
        name: String::from("GIOŚ"),
        homepage: String::from("https://powietrze.gios.gov.pl"),
    }
}

/// Most recent non-null value of a series.
fn latest_value(values: Vec<Measurement>) -> Result<Option<f64>, PortError> {
    let mut dated = values
        .into_iter()
        .map(|measurement| {
            NaiveDateTime::parse_from_str(&measurement.date, DATE_FORMAT)
                .map(|date| (date, measurement.value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    dated.sort_by_key(|(date, _value)| Reverse(*date));

    Ok(dated.into_iter().find_map(|(_date, value)| value))
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };
    use smogmap_core::{CollectingReporter, distance_meters};

    use super::*;

    const CENTER: Point = Point::new(51.107, 17.0385);

    fn measurement(date: &str, value: Option<f64>) -> Measurement {
        Measurement {
            date: date.to_owned(),
            value,
        }
    }

    #[test]
    fn latest_value_skips_nulls_and_orders_by_date() {
        let values = vec![
            measurement("2024-01-01 11:00:00", Some(9.0)),
            measurement("2024-01-01 13:00:00", None),
            measurement("2024-01-01 12:00:00", Some(8.0)),
        ];

        let latest = latest_value(values).expect("dates parse");

        assert_eq!(latest, Some(8.0), "newest non-null wins");
    }

    #[test]
    fn latest_value_of_all_nulls_is_unknown() {
        let values = vec![measurement("2024-01-01 13:00:00", None)];

        assert_eq!(latest_value(values).expect("dates parse"), None, "no reading");
        assert_eq!(latest_value(Vec::new()).expect("empty"), None, "no series");
    }

    #[test]
    fn latest_value_rejects_garbage_dates() {
        let values = vec![measurement("yesterday", Some(1.0))];

        assert!(
            matches!(latest_value(values), Err(PortError::Date(_))),
            "garbage date is a shape failure"
        );
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture address");
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{addr}")
    }

    async fn stations() -> Json<serde_json::Value> {
        Json(serde_json::json!([
            {"id": 114, "stationName": "Wrocław - Bartnicza", "gegrLat": "51.116", "gegrLon": "17.0385"},
            {"id": 115, "stationName": "Wrocław - Wiśniowa", "gegrLat": "51.099", "gegrLon": "17.0385"},
            {"id": 116, "stationName": "Kraków - Bujaka", "gegrLat": "50.0106", "gegrLon": "19.9494"},
            {"id": 117, "stationName": "Wrocław - Korzeniowskiego", "gegrLat": 51.110, "gegrLon": 17.04},
            {"id": 118, "stationName": "broken", "gegrLat": "?", "gegrLon": "17.0"},
            {"id": 119, "stationName": "Wrocław - Na Grobli", "gegrLat": "51.120", "gegrLon": "17.030"}
        ]))
    }

    async fn station_sensors(Path(id): Path<i64>) -> Response {
        match id {
            114 => Json(serde_json::json!([
                {"id": 900, "stationId": 114, "param": {"paramName": "pył zawieszony PM10", "paramCode": "PM10"}},
                {"id": 901, "stationId": 114, "param": {"paramName": "pył zawieszony PM2.5", "paramCode": "PM2.5"}}
            ]))
            .into_response(),
            115 => Json(serde_json::json!([
                {"id": 910, "stationId": 115, "param": {"paramName": "dwutlenek azotu", "paramCode": "NO2"}}
            ]))
            .into_response(),
            119 => Json(serde_json::json!([
                {"id": 920, "stationId": 119, "param": {"paramName": "pył zawieszony PM2.5", "paramCode": "PM2.5"}}
            ]))
            .into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn sensor_data(Path(id): Path<i64>) -> Response {
        if id == 920 {
            StatusCode::BAD_GATEWAY.into_response()
        } else if id == 901 {
            Json(serde_json::json!({
                "key": "PM2.5",
                "values": [
                    {"date": "2024-01-01 13:00:00", "value": null},
                    {"date": "2024-01-01 12:00:00", "value": 8.0},
                    {"date": "2024-01-01 11:00:00", "value": 11.5}
                ]
            }))
            .into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        }
    }

    fn upstream() -> Router {
        Router::new()
            .route("/station/findAll", get(stations))
            .route("/station/sensors/:id", get(station_sensors))
            .route("/data/getData/:id", get(sensor_data))
    }

    fn port(base_url: String, reporter: &Arc<CollectingReporter>) -> GiosSensorPort {
        GiosSensorPort::new(
            Client::new(),
            GiosConfig { base_url },
            Arc::clone(reporter) as Arc<dyn ErrorReporter>,
        )
    }

    #[tokio::test]
    async fn fetch_resolves_stations_in_radius() {
        let reporter = Arc::new(CollectingReporter::new());
        let port = port(serve(upstream()).await, &reporter);

        let sensors = port.fetch(CENTER, 5_000.0).await.expect("fetch");

        let values: Vec<Option<f64>> = sensors.iter().map(|sensor| sensor.value).collect();
        assert_eq!(
            values,
            vec![Some(8.0), None, None, None],
            "114 read, 115 no PM2.5, 117 sensors down, 119 data down"
        );
        assert!(
            sensors
                .iter()
                .all(|sensor| sensor.source == ProviderTag::Gios
                    && distance_meters(CENTER, sensor.point()) < 5_000.0),
            "{sensors:?}"
        );
        let entries = reporter.entries();
        assert_eq!(entries.len(), 2, "only the failing stations are reported: {entries:?}");
        assert!(
            entries.iter().any(|entry| entry.starts_with("GIOS station 119")),
            "data failure reported: {entries:?}"
        );
    }

    #[tokio::test]
    async fn malformed_station_list_is_a_json_error() {
        let reporter = Arc::new(CollectingReporter::new());
        let router = Router::new().route(
            "/station/findAll",
            get(|| async { Json(serde_json::json!({"error": "maintenance"})) }),
        );
        let port = port(serve(router).await, &reporter);

        let result = port.fetch(CENTER, 5_000.0).await;

        assert!(matches!(result, Err(PortError::Json(_))), "{result:?}");
        assert!(reporter.entries().is_empty(), "left to the caller's fallback");
    }

    #[tokio::test]
    async fn failed_discovery_status_yields_empty() {
        let reporter = Arc::new(CollectingReporter::new());
        let router = Router::new().route(
            "/station/findAll",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let port = port(serve(router).await, &reporter);

        let sensors = port.fetch(CENTER, 5_000.0).await.expect("status is not fatal");

        assert!(sensors.is_empty(), "{sensors:?}");
        assert_eq!(reporter.entries().len(), 1, "status reported");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let reporter = Arc::new(CollectingReporter::new());
        let port = port("http://127.0.0.1:9".to_owned(), &reporter);

        let result = port.fetch(CENTER, 5_000.0).await;

        assert!(matches!(result, Err(PortError::Network(_))), "{result:?}");
    }
}
