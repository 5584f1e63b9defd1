//! Spherical distance and latitude-aware bounding boxes.

use crate::model::Point;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS-84 equatorial radius, in meters.
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 polar radius, in meters.
const WGS84_B: f64 = 6_356_752.314_245;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Rectangular region in decimal degrees.
pub struct BoundingBox {
    /// Southern edge.
    pub lat_min: f64,
    /// Western edge.
    pub lon_min: f64,
    /// Northern edge.
    pub lat_max: f64,
    /// Eastern edge.
    pub lon_max: f64,
}

impl BoundingBox {
    /// Whether `point` lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat)
            && (self.lon_min..=self.lon_max).contains(&point.lon)
    }
}

/// Great-circle distance between two points using the haversine formula.
#[must_use]
pub fn distance_meters(from: Point, to: Point) -> f64 {
    let from_lat = from.lat.to_radians();
    let to_lat = to.lat.to_radians();
    let delta_lat = (from.lat - to.lat).to_radians();
    let delta_lon = (from.lon - to.lon).to_radians();

    let haversine = (delta_lat / 2.0).sin().powi(2)
        + from_lat.cos() * to_lat.cos() * (delta_lon / 2.0).sin().powi(2);
    let central_angle = 2.0 * haversine.sqrt().atan2((1.0 - haversine).sqrt());

    EARTH_RADIUS_M * central_angle
}

/// Radius of the WGS-84 ellipsoid at the given latitude (radians).
fn wgs84_radius(lat_rad: f64) -> f64 {
    let numerator_a = WGS84_A * WGS84_A * lat_rad.cos();
    let numerator_b = WGS84_B * WGS84_B * lat_rad.sin();
    let denominator_a = WGS84_A * lat_rad.cos();
    let denominator_b = WGS84_B * lat_rad.sin();

    ((numerator_a * numerator_a + numerator_b * numerator_b)
        / (denominator_a * denominator_a + denominator_b * denominator_b))
        .sqrt()
}

/// Square of side `side_m` meters centered on `center`.
///
/// The longitude span widens with latitude to compensate for meridian convergence,
/// so the box degenerates near the poles.
#[must_use]
pub fn bounding_box(center: Point, side_m: f64) -> BoundingBox {
    let lat_rad = center.lat.to_radians();
    let lon_rad = center.lon.to_radians();
    let half_side = side_m / 2.0;

    let radius = wgs84_radius(lat_rad);
    let parallel_radius = radius * lat_rad.cos();

    BoundingBox {
        lat_min: (lat_rad - half_side / radius).to_degrees(),
        lon_min: (lon_rad - half_side / parallel_radius).to_degrees(),
        lat_max: (lat_rad + half_side / radius).to_degrees(),
        lon_max: (lon_rad + half_side / parallel_radius).to_degrees(),
    }
}

/// Keep only the items whose position is strictly closer than `radius_m` to `center`.
pub fn within_radius<T, F>(items: Vec<T>, center: Point, radius_m: f64, position: F) -> Vec<T>
where
    F: Fn(&T) -> Point,
{
    items
        .into_iter()
        .filter(|item| distance_meters(center, position(item)) < radius_m)
        .collect()
}
