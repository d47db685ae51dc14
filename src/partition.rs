//! Calendar-day partitioning of captures.
//!
//! The first pipeline stage: buckets captures by the local calendar day of
//! their own timestamp, splits each day into geotagged members (input to
//! spatial clustering) and non-geotagged "extras" (attached later by the
//! merger), and counts captures that carry no timestamp at all.
//!
//! The day boundary comes from each capture's embedded UTC offset, not from
//! the clock of the machine running the pipeline: a photo taken at 23:40 in
//! Tokyo belongs to its Tokyo day wherever the archive is rebuilt.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use log::debug;

use crate::Capture;

/// Captures bucketed by local calendar day.
#[derive(Debug, Default)]
pub struct DayBuckets {
    /// Geotagged captures per day, sorted ascending by timestamp.
    /// BTreeMap keeps day iteration deterministic.
    pub geotagged: BTreeMap<NaiveDate, Vec<Capture>>,
    /// Timestamped captures with no usable coordinates, per day.
    pub extras: HashMap<NaiveDate, Vec<Capture>>,
    /// Captures excluded because they carry no timestamp.
    pub skipped: usize,
}

/// Bucket captures by local day.
///
/// Captures without a timestamp are silently excluded and counted; captures
/// with non-finite or out-of-range coordinates are treated as not geotagged
/// and land in `extras`. Neither case is an error.
pub fn partition_by_day(captures: &[Capture]) -> DayBuckets {
    let mut buckets = DayBuckets::default();

    for capture in captures {
        let Some(ts) = capture.timestamp else {
            buckets.skipped += 1;
            continue;
        };
        let day = ts.date_naive();

        if capture.geo_point().is_some() {
            buckets.geotagged.entry(day).or_default().push(capture.clone());
        } else {
            buckets.extras.entry(day).or_default().push(capture.clone());
        }
    }

    for members in buckets.geotagged.values_mut() {
        members.sort_by_key(|c| c.timestamp);
    }

    if buckets.skipped > 0 {
        debug!(
            "[Trips] excluded {} capture(s) with no timestamp",
            buckets.skipped
        );
    }

    buckets
}
