//! # Geographic Utilities
//!
//! Core geographic computations for capture clustering and trip labeling.
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees), the
//! standard emitted by camera GPS units and reverse-geocoding services.
//! Distances are returned in kilometers; the haversine formula is accurate to
//! within 0.3% for the sub-100km spans a field trip covers.

use crate::GeoPoint;
use geo::{Distance, Haversine, Point};

/// Kilometers per statute mile, for the title-dedup threshold which is
/// configured in miles.
pub const KM_PER_MILE: f64 = 1.609_344;

/// Mean kilometers per degree of latitude (WGS84).
pub const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometers per degree of longitude at the equator; shrinks with cos(lat).
pub const KM_PER_DEG_LNG_EQUATOR: f64 = 111.320;

/// Great-circle distance between two points in kilometers.
///
/// # Example
///
/// ```
/// use trip_builder::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
/// let km = geo_utils::haversine_km(&london, &paris);
/// assert!((km - 343.5).abs() < 2.0);
/// ```
#[inline]
pub fn haversine_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2) / 1000.0
}

/// Great-circle distance in statute miles.
#[inline]
pub fn haversine_miles(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_km(p1, p2) / KM_PER_MILE
}

/// Arithmetic-mean centroid of a set of points.
///
/// Returns `None` for an empty slice. Mean lat/lon is adequate at trip scale;
/// clusters never approach the antimeridian cases where it breaks down.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    Some(GeoPoint::new(lat, lng))
}

/// Maximum haversine distance from any point to the given center, in km.
pub fn max_spread_km(points: &[GeoPoint], center: &GeoPoint) -> f64 {
    points
        .iter()
        .map(|p| haversine_km(p, center))
        .fold(0.0, f64::max)
}

/// Format a point as `"lat, lng"` with 3 decimal places, the fallback display
/// form for trips with no usable place labels.
pub fn format_coords(p: &GeoPoint) -> String {
    format!("{:.3}, {:.3}", p.latitude, p.longitude)
}
