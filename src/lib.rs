//! # Trip Builder
//!
//! Infers discrete "field trips" from a flat set of timestamped, optionally
//! geotagged wildlife photo captures, and computes display-ready summary
//! facts for each. This is the synthesis engine behind a static photo-archive
//! site; EXIF extraction, reverse geocoding, and rendering all live upstream
//! or downstream of it.
//!
//! The engine is a pure function: `(captures, first-seen map, config)` in,
//! ordered trips out. It performs no I/O, holds no global state, and
//! recomputes everything on each call; trip ids are positional only.
//!
//! ## Pipeline
//!
//! 1. Bucket geotagged captures by the local day of their own UTC offset
//! 2. Per day, cluster captures into connected components under pairwise
//!    haversine distance within the radius (default 30 km)
//! 3. Attach the day's non-geotagged captures per the configured merge policy
//! 4. Label, summarize, then rank (day desc, size desc) and assign ids
//!
//! ## Features
//!
//! - **`parallel`** - per-day clustering via rayon
//! - **`serde`** - serde derives on the output types
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use trip_builder::{build_trips, Capture, TripConfig};
//!
//! let capture = Capture {
//!     species: "Blue Jay".to_string(),
//!     filename: "jay.jpg".to_string(),
//!     timestamp: "2025-07-04T10:00:00-04:00".parse().ok(),
//!     latitude: 40.0,
//!     longitude: -74.0,
//!     ..Capture::default()
//! };
//!
//! let result = build_trips(&[capture], &HashMap::new(), &TripConfig::default());
//! assert_eq!(result.trips.len(), 1);
//! assert_eq!(result.trips[0].id, "trip-1");
//! ```

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use log::info;

pub mod cluster;
pub mod geo_utils;
pub mod labels;
pub mod partition;
pub mod summary;

pub use cluster::{cluster_day, merge_extras, GeoCluster};
pub use partition::{partition_by_day, DayBuckets};
pub use summary::{duration_label, summarize_trip, top_by_count};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and within coordinate range. Invalid points mean "not
    /// geotagged", never an error.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One photographic observation as delivered by the metadata pipeline.
///
/// `src` and `filename` are opaque media references passed through to the
/// renderer. Place labels come from an external reverse-geocoding cache and
/// may be absent or inconsistent in casing and spelling. The timestamp
/// carries the capture's own UTC offset; its local calendar day is the unit
/// of temporal bucketing.
#[derive(Debug, Clone)]
pub struct Capture {
    pub species: String,
    pub filename: String,
    /// Media path for the renderer (thumbnail/full image).
    pub src: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// NaN when the photo has no GPS fix.
    pub latitude: f64,
    pub longitude: f64,
    pub camera: String,
    pub lens: String,
    pub exposure: String,
    pub aperture: String,
    pub iso: String,
    /// Park or named-site label, when the geocoding cache has one.
    pub park: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Precomputed free-form display label, when present.
    pub location_label: Option<String>,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            species: String::new(),
            filename: String::new(),
            src: String::new(),
            timestamp: None,
            latitude: f64::NAN,
            longitude: f64::NAN,
            camera: String::new(),
            lens: String::new(),
            exposure: String::new(),
            aperture: String::new(),
            iso: String::new(),
            park: None,
            city: None,
            state: None,
            country: None,
            location_label: None,
        }
    }
}

impl Capture {
    /// The capture's coordinate when it is geotagged.
    pub fn geo_point(&self) -> Option<GeoPoint> {
        let p = GeoPoint::new(self.latitude, self.longitude);
        p.is_valid().then_some(p)
    }
}

/// How a day's non-geotagged captures are attached to its clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MergePolicy {
    /// Each extra joins exactly one cluster: the day's largest, ties broken
    /// by earliest member timestamp. Default.
    #[default]
    LargestCluster,
    /// Every cluster receives every extra, so one photo can appear in more
    /// than one trip on a multi-cluster day.
    AttachAll,
}

/// Engine configuration. Everything the computation depends on is passed in
/// explicitly; there are no module-level caches or ambient settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripConfig {
    /// Captures connected by pairwise hops within this radius co-cluster.
    /// Default: 30 km.
    pub cluster_radius_km: f64,
    /// Minimum separation between place labels sharing a trip title.
    /// Default: 3 miles.
    pub title_dedup_miles: f64,
    /// Non-geotagged capture attachment policy.
    pub merge_policy: MergePolicy,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            cluster_radius_km: 30.0,
            title_dedup_miles: 3.0,
            merge_policy: MergePolicy::default(),
        }
    }
}

/// One renderer-facing image record, populated from capture data but not
/// interpreted here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripImage {
    pub src: String,
    pub species: String,
    pub date_label: String,
    pub species_href: String,
    pub filename: String,
}

/// One inferred field trip. Immutable after construction; `id` is positional
/// within a single run and carries no cross-run identity.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trip {
    /// `"trip-1"`, `"trip-2"`, … in final ranked order.
    pub id: String,
    pub day_key: NaiveDate,
    pub date_label: String,
    /// `"HH:MM–HH:MM"` span between first and last capture.
    pub time_range: String,
    pub duration_label: String,
    pub image_count: usize,
    pub species_count: usize,
    /// Distinct species, case-insensitive alphabetical.
    pub species: Vec<String>,
    /// `"Name (count)"` for the most-photographed species.
    pub top_species_label: String,
    pub has_new_species: bool,
    pub new_species_label: String,
    pub gear_label: String,
    pub location_title: String,
    /// Deduplicated best label per capture, first-seen order.
    pub locations: Vec<String>,
    pub centroid: GeoPoint,
    pub max_spread_km: f64,
    /// Chronologically last capture of the trip.
    pub cover: TripImage,
    pub map_href: String,
    pub images: Vec<TripImage>,
}

/// Output of a build: the ranked trips plus the count of captures excluded
/// for having no timestamp.
#[derive(Debug, Clone, Default)]
pub struct TripBuildResult {
    pub trips: Vec<Trip>,
    pub skipped_captures: usize,
}

// ============================================================================
// Pipeline
// ============================================================================

fn trips_for_day(
    day: NaiveDate,
    members: &[Capture],
    extras: Option<&Vec<Capture>>,
    first_seen_day_by_species: &HashMap<String, NaiveDate>,
    config: &TripConfig,
) -> Vec<Trip> {
    let mut clusters = cluster::cluster_day(members, config.cluster_radius_km);
    if let Some(extras) = extras {
        cluster::merge_extras(&mut clusters, extras, config.merge_policy);
    }
    clusters
        .into_iter()
        .map(|c| summary::summarize_trip(day, c, first_seen_day_by_species, config))
        .collect()
}

/// Rank trips most-recent-day first, larger trips first within a day, and
/// assign positional ids. Centroid longitude then latitude break remaining
/// ties so the order is total and never depends on discovery order.
fn rank_trips(trips: &mut Vec<Trip>) {
    trips.sort_by(|a, b| {
        b.day_key
            .cmp(&a.day_key)
            .then_with(|| b.image_count.cmp(&a.image_count))
            .then_with(|| a.centroid.longitude.total_cmp(&b.centroid.longitude))
            .then_with(|| a.centroid.latitude.total_cmp(&b.centroid.latitude))
    });
    for (i, trip) in trips.iter_mut().enumerate() {
        trip.id = format!("trip-{}", i + 1);
    }
}

/// Build the ranked trip list for an archive.
///
/// `first_seen_day_by_species` maps each species to the earliest day it was
/// ever captured, computed once by the caller over the whole archive; a
/// species is "new" in a trip iff that day equals the trip's day.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use trip_builder::{build_trips, Capture, TripConfig};
///
/// let result = build_trips(&[], &HashMap::new(), &TripConfig::default());
/// assert!(result.trips.is_empty());
/// ```
pub fn build_trips(
    captures: &[Capture],
    first_seen_day_by_species: &HashMap<String, NaiveDate>,
    config: &TripConfig,
) -> TripBuildResult {
    let buckets = partition::partition_by_day(captures);

    let mut trips: Vec<Trip> = buckets
        .geotagged
        .iter()
        .flat_map(|(day, members)| {
            trips_for_day(*day, members, buckets.extras.get(day), first_seen_day_by_species, config)
        })
        .collect();

    rank_trips(&mut trips);

    info!(
        "[Trips] built {} trip(s) from {} capture(s), {} skipped",
        trips.len(),
        captures.len(),
        buckets.skipped
    );

    TripBuildResult { trips, skipped_captures: buckets.skipped }
}

/// Parallel variant of [`build_trips`]: days are clustered concurrently with
/// rayon. The final sort is deterministic, so output is identical to the
/// sequential build.
#[cfg(feature = "parallel")]
pub fn build_trips_parallel(
    captures: &[Capture],
    first_seen_day_by_species: &HashMap<String, NaiveDate>,
    config: &TripConfig,
) -> TripBuildResult {
    use rayon::prelude::*;

    let buckets = partition::partition_by_day(captures);
    let days: Vec<(&NaiveDate, &Vec<Capture>)> = buckets.geotagged.iter().collect();

    let mut trips: Vec<Trip> = days
        .par_iter()
        .flat_map(|&(day, members)| {
            trips_for_day(*day, members, buckets.extras.get(day), first_seen_day_by_species, config)
        })
        .collect();

    rank_trips(&mut trips);

    info!(
        "[Trips] built {} trip(s) from {} capture(s) in parallel, {} skipped",
        trips.len(),
        captures.len(),
        buckets.skipped
    );

    TripBuildResult { trips, skipped_captures: buckets.skipped }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Shared test constructor: a capture with the basics filled in.
    pub(crate) fn capture_at(
        species: &str,
        filename: &str,
        rfc3339: &str,
        lat: f64,
        lng: f64,
    ) -> Capture {
        Capture {
            species: species.to_string(),
            filename: filename.to_string(),
            src: format!("images/{filename}"),
            timestamp: Some(rfc3339.parse().expect("test timestamp")),
            latitude: lat,
            longitude: lng,
            ..Capture::default()
        }
    }

    fn blue_jay_pair() -> Vec<Capture> {
        vec![
            capture_at("Blue Jay", "a.jpg", "2025-07-04T10:00:00-04:00", 40.000, -74.000),
            capture_at("Blue Jay", "b.jpg", "2025-07-04T10:50:00-04:00", 40.200, -74.100),
        ]
    }

    #[test]
    fn nearby_same_day_pair_forms_one_trip() {
        let result = build_trips(&blue_jay_pair(), &HashMap::new(), &TripConfig::default());
        assert_eq!(result.trips.len(), 1);
        let trip = &result.trips[0];
        assert_eq!(trip.image_count, 2);
        assert_eq!(trip.species_count, 1);
        assert_eq!(trip.duration_label, "50m");
        assert_eq!(trip.id, "trip-1");
    }

    #[test]
    fn distant_same_day_capture_splits_into_second_trip() {
        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.500, -75.500));

        let result = build_trips(&captures, &HashMap::new(), &TripConfig::default());
        assert_eq!(result.trips.len(), 2);

        let jay_trip = result
            .trips
            .iter()
            .find(|t| t.species.contains(&"Blue Jay".to_string()))
            .unwrap();
        let robin_trip = result
            .trips
            .iter()
            .find(|t| t.species.contains(&"Robin".to_string()))
            .unwrap();
        assert_eq!(jay_trip.image_count, 2);
        assert_eq!(robin_trip.image_count, 1);
        assert!(!jay_trip.species.contains(&"Robin".to_string()));
    }

    #[test]
    fn ranking_is_day_desc_then_size_desc() {
        let mut captures = blue_jay_pair(); // July 4, two images
        captures.push(capture_at("Wren", "w.jpg", "2025-07-06T08:00:00-04:00", 40.0, -74.0));

        let result = build_trips(&captures, &HashMap::new(), &TripConfig::default());
        assert_eq!(result.trips[0].day_key, NaiveDate::from_ymd_opt(2025, 7, 6).unwrap());
        assert_eq!(result.trips[0].id, "trip-1");
        assert_eq!(result.trips[1].id, "trip-2");

        // Same day: larger trip first.
        let mut same_day = blue_jay_pair();
        same_day.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        let result = build_trips(&same_day, &HashMap::new(), &TripConfig::default());
        assert_eq!(result.trips[0].image_count, 2);
        assert_eq!(result.trips[1].image_count, 1);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        captures.push(capture_at("Wren", "w.jpg", "2025-07-06T08:00:00-04:00", 40.0, -74.0));
        let mut first_seen = HashMap::new();
        first_seen.insert("Wren".to_string(), NaiveDate::from_ymd_opt(2025, 7, 6).unwrap());

        let config = TripConfig::default();
        let a = build_trips(&captures, &first_seen, &config);
        let b = build_trips(&captures, &first_seen, &config);

        assert_eq!(a.trips.len(), b.trips.len());
        for (x, y) in a.trips.iter().zip(b.trips.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.day_key, y.day_key);
            assert_eq!(x.images, y.images);
            assert_eq!(x.location_title, y.location_title);
        }
    }

    #[test]
    fn new_species_never_appears_on_later_trips() {
        let captures = vec![
            capture_at("Blue Jay", "a.jpg", "2025-07-04T10:00:00-04:00", 40.0, -74.0),
            capture_at("Blue Jay", "b.jpg", "2025-07-10T10:00:00-04:00", 40.0, -74.0),
        ];
        let mut first_seen = HashMap::new();
        first_seen.insert("Blue Jay".to_string(), NaiveDate::from_ymd_opt(2025, 7, 4).unwrap());

        let result = build_trips(&captures, &first_seen, &TripConfig::default());
        assert_eq!(result.trips.len(), 2);
        let july4 = result.trips.iter().find(|t| t.day_key.to_string() == "2025-07-04").unwrap();
        let july10 = result.trips.iter().find(|t| t.day_key.to_string() == "2025-07-10").unwrap();
        assert_eq!(july4.new_species_label, "Blue Jay");
        assert_eq!(july10.new_species_label, "None");
    }

    #[test]
    fn attach_all_duplicates_extra_across_both_trips() {
        let mut extra = capture_at("Crow", "d.jpg", "2025-07-04T12:30:00-04:00", 0.0, 0.0);
        extra.latitude = f64::NAN;
        extra.longitude = f64::NAN;

        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        captures.push(extra);

        let config = TripConfig { merge_policy: MergePolicy::AttachAll, ..TripConfig::default() };
        let result = build_trips(&captures, &HashMap::new(), &config);
        assert_eq!(result.trips.len(), 2);
        for trip in &result.trips {
            assert!(trip.images.iter().any(|i| i.filename == "d.jpg"));
        }
    }

    #[test]
    fn default_policy_attaches_extra_to_single_largest_trip() {
        let mut extra = capture_at("Crow", "d.jpg", "2025-07-04T12:30:00-04:00", 0.0, 0.0);
        extra.latitude = f64::NAN;
        extra.longitude = f64::NAN;

        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        captures.push(extra);

        let result = build_trips(&captures, &HashMap::new(), &TripConfig::default());
        let holders: Vec<&Trip> = result
            .trips
            .iter()
            .filter(|t| t.images.iter().any(|i| i.filename == "d.jpg"))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].image_count, 3); // joined the two-jay cluster
    }

    #[test]
    fn extras_without_clusters_are_dropped() {
        let mut extra = capture_at("Crow", "d.jpg", "2025-07-04T12:30:00-04:00", 0.0, 0.0);
        extra.latitude = f64::NAN;
        extra.longitude = f64::NAN;
        let result = build_trips(&[extra], &HashMap::new(), &TripConfig::default());
        assert!(result.trips.is_empty());
        assert_eq!(result.skipped_captures, 0);
    }

    #[test]
    fn skipped_count_reports_timestampless_captures() {
        let mut captures = blue_jay_pair();
        let mut lost = capture_at("Crow", "d.jpg", "2025-07-04T12:30:00-04:00", 40.0, -74.0);
        lost.timestamp = None;
        captures.push(lost);

        let result = build_trips(&captures, &HashMap::new(), &TripConfig::default());
        assert_eq!(result.skipped_captures, 1);
        assert_eq!(result.trips.len(), 1);
        assert_eq!(result.trips[0].image_count, 2);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let result = build_trips(&[], &HashMap::new(), &TripConfig::default());
        assert!(result.trips.is_empty());
        assert_eq!(result.skipped_captures, 0);
    }

    #[test]
    fn count_invariants_hold_for_every_trip() {
        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        captures.push(capture_at("Wren", "w.jpg", "2025-07-06T08:00:00-04:00", 40.0, -74.0));

        let result = build_trips(&captures, &HashMap::new(), &TripConfig::default());
        for trip in &result.trips {
            assert_eq!(trip.image_count, trip.images.len());
            assert_eq!(trip.species_count, trip.species.len());
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_build_matches_sequential() {
        let mut captures = blue_jay_pair();
        captures.push(capture_at("Robin", "c.jpg", "2025-07-04T12:00:00-04:00", 41.5, -75.5));
        captures.push(capture_at("Wren", "w.jpg", "2025-07-06T08:00:00-04:00", 40.0, -74.0));

        let config = TripConfig::default();
        let seq = build_trips(&captures, &HashMap::new(), &config);
        let par = build_trips_parallel(&captures, &HashMap::new(), &config);

        assert_eq!(seq.trips.len(), par.trips.len());
        for (a, b) in seq.trips.iter().zip(par.trips.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.images, b.images);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn trip_survives_json_round_trip() {
        let result = build_trips(&blue_jay_pair(), &HashMap::new(), &TripConfig::default());
        let trip = &result.trips[0];

        let json = serde_json::to_string(trip).expect("serialize trip");
        let back: Trip = serde_json::from_str(&json).expect("deserialize trip");

        assert_eq!(back.id, trip.id);
        assert_eq!(back.day_key, trip.day_key);
        assert_eq!(back.image_count, trip.image_count);
        assert_eq!(back.species, trip.species);
        assert_eq!(back.images, trip.images);
        assert!((back.centroid.latitude - trip.centroid.latitude).abs() < 1e-12);
    }
}
