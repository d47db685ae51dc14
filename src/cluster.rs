//! Spatial clustering of a single day's captures.
//!
//! ## Algorithm
//! 1. Build an R-tree over the day's geotagged captures
//! 2. BFS each unvisited capture, pulling neighbor candidates from a padded
//!    envelope query
//! 3. Keep a candidate only if its exact haversine distance is within the
//!    radius
//! 4. Each exhausted BFS frontier is one cluster; compute its centroid and
//!    max spread
//!
//! Membership is decided only by the exact haversine check, so the envelope
//! prefilter can never change the partition. Two captures end up together
//! iff a chain of pairwise hops each within the radius connects them. The
//! envelope padding over-covers both axes: latitude by a fixed factor,
//! longitude by the worst-case cosine across the padded latitude band. An
//! envelope that crosses the antimeridian is split into two queries, and
//! near the poles the longitude range widens to the full globe, so the
//! candidate set stays a superset of the true neighbor set everywhere.
//!
//! The merger half of this module attaches the day's non-geotagged captures
//! to the clusters under an explicit [`MergePolicy`].

use std::collections::HashSet;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{self, KM_PER_DEG_LAT, KM_PER_DEG_LNG_EQUATOR};
use crate::{Capture, GeoPoint, MergePolicy};

/// A maximal set of same-day captures connected transitively through
/// pairwise haversine distance within the cluster radius.
#[derive(Debug, Clone)]
pub struct GeoCluster {
    /// Member captures, sorted ascending by timestamp.
    pub captures: Vec<Capture>,
    /// Arithmetic-mean centroid of the geotagged members.
    pub centroid: GeoPoint,
    /// Farthest geotagged member from the centroid, in km.
    pub max_spread_km: f64,
}

/// One capture's position in the day's R-tree.
#[derive(Debug, Clone)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Safety margin on the envelope padding. Only affects how many candidates
/// reach the exact check, never the result.
const ENVELOPE_MARGIN: f64 = 1.05;

/// Above this latitude the radius can sweep every longitude, so the
/// envelope covers the full range instead of a cosine-scaled pad.
const POLAR_BAND_DEG: f64 = 89.0;

/// Envelopes that together cover everything within `radius_km` of the point.
///
/// Longitude padding uses the worst-case cosine over the padded latitude
/// band, not just the point's own latitude, so the pad stays conservative
/// for hops toward the poles. An envelope that would cross the antimeridian
/// is split into two, one per side of the seam.
fn search_envelopes(lat: f64, lng: f64, radius_km: f64) -> Vec<AABB<[f64; 2]>> {
    let lat_pad = radius_km / KM_PER_DEG_LAT * ENVELOPE_MARGIN;
    let lat_lo = lat - lat_pad;
    let lat_hi = lat + lat_pad;

    let band_edge = (lat.abs() + lat_pad).min(90.0);
    if band_edge >= POLAR_BAND_DEG {
        return vec![AABB::from_corners([-180.0, lat_lo], [180.0, lat_hi])];
    }

    // A degree of longitude is shortest at the band edge nearest a pole.
    let cos_band = band_edge.to_radians().cos();
    let lng_pad = radius_km / (KM_PER_DEG_LNG_EQUATOR * cos_band) * ENVELOPE_MARGIN;
    if lng_pad >= 180.0 {
        return vec![AABB::from_corners([-180.0, lat_lo], [180.0, lat_hi])];
    }

    let west = lng - lng_pad;
    let east = lng + lng_pad;
    if west < -180.0 {
        vec![
            AABB::from_corners([-180.0, lat_lo], [east, lat_hi]),
            AABB::from_corners([west + 360.0, lat_lo], [180.0, lat_hi]),
        ]
    } else if east > 180.0 {
        vec![
            AABB::from_corners([west, lat_lo], [180.0, lat_hi]),
            AABB::from_corners([-180.0, lat_lo], [east - 360.0, lat_hi]),
        ]
    } else {
        vec![AABB::from_corners([west, lat_lo], [east, lat_hi])]
    }
}

/// Partition one day's geotagged captures into connected components under
/// pairwise haversine distance <= `radius_km`.
///
/// The result is independent of input order: clusters are emitted ordered by
/// earliest member timestamp, then centroid longitude, and each cluster's
/// members are sorted ascending by timestamp.
pub fn cluster_day(captures: &[Capture], radius_km: f64) -> Vec<GeoCluster> {
    let points: Vec<IndexedPoint> = captures
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| {
            c.geo_point()
                .map(|p| IndexedPoint { idx, lat: p.latitude, lng: p.longitude })
        })
        .collect();

    if points.is_empty() {
        return vec![];
    }

    let rtree = RTree::bulk_load(points.clone());
    let mut visited = vec![false; captures.len()];
    let mut clusters = Vec::new();

    for seed in &points {
        if visited[seed.idx] {
            continue;
        }
        visited[seed.idx] = true;

        let mut member_idx = vec![seed.idx];
        let mut frontier = vec![seed.clone()];

        while let Some(current) = frontier.pop() {
            for envelope in search_envelopes(current.lat, current.lng, radius_km) {
                for candidate in rtree.locate_in_envelope_intersecting(&envelope) {
                    if visited[candidate.idx] {
                        continue;
                    }
                    let a = GeoPoint::new(current.lat, current.lng);
                    let b = GeoPoint::new(candidate.lat, candidate.lng);
                    if geo_utils::haversine_km(&a, &b) <= radius_km {
                        visited[candidate.idx] = true;
                        member_idx.push(candidate.idx);
                        frontier.push(candidate.clone());
                    }
                }
            }
        }

        let mut members: Vec<Capture> =
            member_idx.iter().map(|&i| captures[i].clone()).collect();
        members.sort_by_key(|c| c.timestamp);

        let coords: Vec<GeoPoint> =
            members.iter().filter_map(|c| c.geo_point()).collect();
        // members came from geo_point() filtering, so coords is never empty
        let centroid = geo_utils::centroid(&coords)
            .unwrap_or_else(|| GeoPoint::new(0.0, 0.0));
        let max_spread_km = geo_utils::max_spread_km(&coords, &centroid);

        clusters.push(GeoCluster { captures: members, centroid, max_spread_km });
    }

    clusters.sort_by(|a, b| {
        let ta = a.captures.first().and_then(|c| c.timestamp);
        let tb = b.captures.first().and_then(|c| c.timestamp);
        ta.cmp(&tb)
            .then_with(|| a.centroid.longitude.total_cmp(&b.centroid.longitude))
    });

    debug!(
        "[Trips] clustered {} capture(s) into {} cluster(s) at {:.0}km radius",
        captures.len(),
        clusters.len(),
        radius_km
    );

    clusters
}

/// Attach a day's non-geotagged captures to its clusters.
///
/// Under [`MergePolicy::LargestCluster`] each extra joins exactly one
/// cluster: the day's largest by geotagged-member count, ties broken by
/// earliest member timestamp. Under [`MergePolicy::AttachAll`] every cluster
/// receives every extra, so one photo can appear in more than one trip on a
/// multi-cluster day. Duplicates are dropped via a `(species, filename)` key,
/// and each touched cluster is re-sorted by timestamp.
pub fn merge_extras(clusters: &mut [GeoCluster], extras: &[Capture], policy: MergePolicy) {
    if clusters.is_empty() || extras.is_empty() {
        return;
    }

    let targets: Vec<usize> = match policy {
        MergePolicy::AttachAll => (0..clusters.len()).collect(),
        MergePolicy::LargestCluster => {
            let best = clusters
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.captures.len().cmp(&b.captures.len()).then_with(|| {
                        let ta = a.captures.first().and_then(|c| c.timestamp);
                        let tb = b.captures.first().and_then(|c| c.timestamp);
                        // Prefer the earlier cluster on a size tie.
                        tb.cmp(&ta)
                    })
                })
                .map(|(i, _)| i);
            best.into_iter().collect()
        }
    };

    for &i in &targets {
        let cluster = &mut clusters[i];
        let mut seen: HashSet<(String, String)> = cluster
            .captures
            .iter()
            .map(|c| (c.species.clone(), c.filename.clone()))
            .collect();

        for extra in extras {
            let key = (extra.species.clone(), extra.filename.clone());
            if seen.insert(key) {
                cluster.captures.push(extra.clone());
            }
        }
        cluster.captures.sort_by_key(|c| c.timestamp);
    }
}
