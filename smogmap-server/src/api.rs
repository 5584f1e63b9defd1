//! HTTP handlers.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use smogmap_core::model::Point;

use crate::AppState;

/// `POST /api/values`
///
/// Body `{"position": {"lat": .., "lon": ..}}`. Rejects anything else with an
/// empty 400 and maps a broken aggregation to an empty 500.
pub async fn values(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(center) = parse_position(&body) else {
        tracing::debug!("rejected malformed position");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.service.aggregate(center, state.radius_m).await {
        Ok(sensors) => Json(sensors).into_response(),
        // already reported by the service
        Err(_err) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// `GET /api/sources`
pub async fn sources(State(state): State<AppState>) -> Response {
    Json(state.service.providers()).into_response()
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "smogmap-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Extract the query position from a request body.
///
/// `position`, `lat` and `lon` must all be present and truthy, so a coordinate of
/// exactly 0 is rejected. Coordinates may be numbers or numeric strings.
#[must_use]
pub fn parse_position(body: &[u8]) -> Option<Point> {
    let body: Value = serde_json::from_slice(body).ok()?;
    let position = body.get("position").filter(|position| is_truthy(position))?;

    Some(Point::new(
        coordinate(position.get("lat")?)?,
        coordinate(position.get("lon")?)?,
    ))
}

fn coordinate(value: &Value) -> Option<f64> {
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok().filter(|parsed: &f64| parsed.is_finite()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|parsed| parsed.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
