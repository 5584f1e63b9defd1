//! HTTP surface for smogmap: routing, state, and provider wiring.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use smogmap_core::{
    http::build_client,
    plugin::PluginRegistry,
    ports::{ErrorReporter, PortError},
    service::SmogService,
};
use smogmap_provider_airly as airly;
use smogmap_provider_gios as gios;
use smogmap_provider_looko2 as looko2;
use smogmap_provider_pwr as pwr;

/// Request handlers.
pub mod api;
/// Flags and environment settings.
pub mod config;

use crate::config::Config;

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Aggregation service.
    pub service: Arc<SmogService>,
    /// Radius applied to every query, in meters.
    pub radius_m: f64,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(service: Arc<SmogService>, radius_m: f64) -> Self {
        Self { service, radius_m }
    }
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/values", post(api::values))
        .route("/api/sources", get(api::sources))
        .route("/health", get(api::health))
        .with_state(state)
}

/// Register every built-in provider.
///
/// # Errors
///
/// Returns [`PortError::Network`] when an HTTP client cannot be built.
pub fn build_registry(
    config: &Config,
    reporter: &Arc<dyn ErrorReporter>,
) -> Result<PluginRegistry, PortError> {
    let client = build_client(config.request_timeout(), false)?;
    let looko2_client = build_client(config.request_timeout(), config.looko2_accept_invalid_certs)?;

    Ok(PluginRegistry::new(vec![
        airly::plugin(client.clone(), config.airly(), Arc::clone(reporter)),
        gios::plugin(client.clone(), config.gios(), Arc::clone(reporter)),
        looko2::plugin(looko2_client, config.looko2(), Arc::clone(reporter)),
        pwr::plugin(client, config.pwr(), Arc::clone(reporter)),
    ]))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use clap::Parser;
    use serde_json::{Value, json};
    use smogmap_core::{
        CollectingReporter, Point, ProviderMeta, ProviderPlugin, ProviderTag, Sensor, SensorPort,
    };
    use tower::util::ServiceExt;

    use super::*;

    const RADIUS_M: f64 = 5_000.0;

    /// Port answering with a canned result, ignoring the query.
    struct CannedPort {
        meta: ProviderMeta,
        sensors: Option<Vec<Sensor>>,
    }

    #[async_trait]
    impl SensorPort for CannedPort {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn fetch(&self, _center: Point, _radius_m: f64) -> Result<Vec<Sensor>, PortError> {
            self.sensors
                .clone()
                .ok_or(PortError::PatternNotFound("canned failure"))
        }
    }

    struct BrokenPort {
        meta: ProviderMeta,
    }

    #[async_trait]
    impl SensorPort for BrokenPort {
        fn meta(&self) -> &ProviderMeta {
            &self.meta
        }

        async fn fetch(&self, _center: Point, _radius_m: f64) -> Result<Vec<Sensor>, PortError> {
            panic!("provider bug")
        }
    }

    fn canned(tag: ProviderTag, sensors: Option<Vec<Sensor>>) -> ProviderPlugin {
        ProviderPlugin::new(Arc::new(CannedPort {
            meta: ProviderMeta {
                tag,
                name: tag.to_string(),
                homepage: String::new(),
            },
            sensors,
        }))
    }

    fn app(plugins: Vec<ProviderPlugin>) -> (Router, Arc<CollectingReporter>) {
        let reporter = Arc::new(CollectingReporter::new());
        let service = SmogService::new(
            Arc::new(PluginRegistry::new(plugins)),
            Arc::clone(&reporter) as Arc<dyn ErrorReporter>,
        );
        (
            build_router(AppState::new(Arc::new(service), RADIUS_M)),
            reporter,
        )
    }

    fn post_values(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/values")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request builds")
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads")
            .to_vec()
    }

    #[tokio::test]
    async fn single_gios_station_end_to_end() {
        // ~1000 m north of the query point
        let station = Sensor::new(Point::new(51.116, 17.0385), Some(8.0), ProviderTag::Gios);
        let (app, _reporter) = app(vec![
            canned(ProviderTag::Gios, Some(vec![station])),
            canned(ProviderTag::Airly, Some(Vec::new())),
            canned(ProviderTag::Looko2, Some(Vec::new())),
            canned(ProviderTag::Pwr, Some(Vec::new())),
        ]);

        let response = app
            .oneshot(post_values(r#"{"position": {"lat": 51.107, "lon": 17.0385}}"#))
            .await
            .expect("router answers");

        assert_eq!(response.status(), StatusCode::OK, "success status");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("JSON body");
        assert_eq!(
            body,
            json!([{"lat": 51.116, "lon": 17.0385, "value": 8.0, "source": "GIOS"}]),
            "one GIOS reading"
        );
    }

    #[tokio::test]
    async fn failing_providers_are_absorbed() {
        let station = Sensor::new(Point::new(51.116, 17.0385), None, ProviderTag::Airly);
        let (app, reporter) = app(vec![
            canned(ProviderTag::Gios, None),
            canned(ProviderTag::Airly, Some(vec![station])),
            canned(ProviderTag::Looko2, None),
            canned(ProviderTag::Pwr, None),
        ]);

        let response = app
            .oneshot(post_values(r#"{"position": {"lat": 51.107, "lon": 17.0385}}"#))
            .await
            .expect("router answers");

        assert_eq!(response.status(), StatusCode::OK, "partial failure is not an error");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("JSON body");
        assert_eq!(
            body,
            json!([{"lat": 51.116, "lon": 17.0385, "value": null, "source": "AIRLY"}]),
            "only the healthy provider"
        );
        assert_eq!(reporter.entries().len(), 3, "three failures reported");
    }

    #[tokio::test]
    async fn missing_position_is_a_bad_request() {
        let (app, _reporter) = app(vec![canned(ProviderTag::Gios, Some(Vec::new()))]);

        let response = app
            .oneshot(post_values(r#"{"where": {"lat": 51.107, "lon": 17.0385}}"#))
            .await
            .expect("router answers");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "client error");
        assert!(body_bytes(response).await.is_empty(), "no body");
    }

    #[tokio::test]
    async fn panicking_provider_keeps_other_readings() {
        let broken = ProviderPlugin::new(Arc::new(BrokenPort {
            meta: ProviderMeta {
                tag: ProviderTag::Pwr,
                name: "PWR".to_owned(),
                homepage: String::new(),
            },
        }));
        let station = Sensor::new(Point::new(51.116, 17.0385), Some(8.0), ProviderTag::Gios);
        let (app, reporter) = app(vec![broken, canned(ProviderTag::Gios, Some(vec![station]))]);

        let response = app
            .oneshot(post_values(r#"{"position": {"lat": 51.107, "lon": 17.0385}}"#))
            .await
            .expect("router answers");

        assert_eq!(response.status(), StatusCode::OK, "provider bug is not a server error");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("JSON body");
        assert_eq!(
            body,
            json!([{"lat": 51.116, "lon": 17.0385, "value": 8.0, "source": "GIOS"}]),
            "healthy provider still answers"
        );
        assert_eq!(reporter.entries().len(), 1, "panic reported");
    }

    #[tokio::test]
    async fn sources_lists_registered_providers() {
        let (app, _reporter) = app(vec![
            canned(ProviderTag::Looko2, Some(Vec::new())),
            canned(ProviderTag::Pwr, Some(Vec::new())),
        ]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/sources")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router answers");

        assert_eq!(response.status(), StatusCode::OK, "success status");
        let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("JSON body");
        let tags: Vec<&str> = body
            .as_array()
            .expect("array body")
            .iter()
            .filter_map(|provider| provider["tag"].as_str())
            .collect();
        assert_eq!(tags, vec!["PWR", "LOOKO2"], "ordered by tag");
    }

    #[tokio::test]
    async fn health_reports_module() {
        let (app, _reporter) = app(Vec::new());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router answers");

        let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("JSON body");
        assert_eq!(body["status"], "ok", "healthy");
        assert_eq!(body["module"], "smogmap-server", "module name");
    }

    #[test]
    fn default_registry_has_all_providers() {
        let config = Config::try_parse_from(["smogmap-server"]).expect("defaults parse");
        let reporter: Arc<dyn ErrorReporter> = Arc::new(CollectingReporter::new());

        let registry = build_registry(&config, &reporter).expect("clients build");

        let tags: Vec<ProviderTag> = registry.providers().into_iter().map(|meta| meta.tag).collect();
        assert_eq!(
            tags,
            vec![ProviderTag::Pwr, ProviderTag::Gios, ProviderTag::Airly, ProviderTag::Looko2],
            "four built-in providers"
        );
        assert!(registry.plugin(ProviderTag::Gios).is_ok(), "lookup by tag");
    }
}
