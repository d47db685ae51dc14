//! Per-trip summary facts.
//!
//! Turns one merged, time-sorted cluster into a display-ready [`Trip`]:
//! date/time/duration labels, species and gear aggregates, new-species
//! detection against the archive-wide first-seen map, cover photo, and the
//! pass-through image records the renderer consumes.
//!
//! Species, camera, and lens all reduce through the same [`top_by_count`]
//! aggregation: group by value, take the highest count, break ties
//! case-insensitively alphabetical.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::cluster::GeoCluster;
use crate::{labels, Capture, Trip, TripConfig, TripImage};

/// Group values by identity and pick the most frequent, breaking count ties
/// by case-insensitive alphabetical order. Empty values never reach this
/// function; callers filter them.
pub fn top_by_count<'a, I>(values: I) -> Option<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| {
            ca.cmp(cb)
                .then_with(|| b.to_lowercase().cmp(&a.to_lowercase()))
                .then_with(|| b.cmp(a))
        })
        .map(|(v, c)| (v.to_string(), c))
}

/// Format an elapsed span in minutes as `"1h 30m"`, `"2h"`, or `"45m"`.
/// Zero or negative spans collapse to `"0m"`.
pub fn duration_label(minutes: i64) -> String {
    if minutes <= 0 {
        return "0m".to_string();
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

fn format_date(day: NaiveDate) -> String {
    day.format("%B %-d, %Y").to_string()
}

fn format_time(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%H:%M").to_string()
}

/// Percent-escape a query-string component. Unreserved characters pass
/// through; everything else, including space, is %XX-escaped.
fn encode_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Slug for species-page links: lowercase alphanumerics joined by hyphens.
fn species_slug(species: &str) -> String {
    let mut slug = String::with_capacity(species.len());
    let mut pending_dash = false;
    for c in species.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn image_for(capture: &Capture) -> TripImage {
    TripImage {
        src: capture.src.clone(),
        species: capture.species.clone(),
        date_label: capture
            .timestamp
            .map(|ts| format_date(ts.date_naive()))
            .unwrap_or_default(),
        species_href: format!("species/{}.html", species_slug(&capture.species)),
        filename: capture.filename.clone(),
    }
}

fn gear_label(captures: &[Capture]) -> String {
    let camera = top_by_count(
        captures
            .iter()
            .map(|c| c.camera.trim())
            .filter(|s| !s.is_empty()),
    )
    .map(|(v, _)| v)
    .unwrap_or_else(|| "Unknown camera".to_string());

    let lens = top_by_count(
        captures
            .iter()
            .map(|c| c.lens.trim())
            .filter(|s| !s.is_empty()),
    )
    .map(|(v, _)| v)
    .unwrap_or_else(|| "Unknown lens".to_string());

    format!("{camera} + {lens}")
}

/// Build the full summary for one cluster. The id is positional and assigned
/// later by the ranker; it is left empty here.
pub fn summarize_trip(
    day: NaiveDate,
    cluster: GeoCluster,
    first_seen_day_by_species: &HashMap<String, NaiveDate>,
    config: &TripConfig,
) -> Trip {
    let captures = cluster.captures;

    let timestamps: Vec<DateTime<FixedOffset>> =
        captures.iter().filter_map(|c| c.timestamp).collect();
    let (time_range, duration) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (
            format!("{}\u{2013}{}", format_time(first), format_time(last)),
            duration_label((*last - *first).num_minutes()),
        ),
        _ => (String::new(), "0m".to_string()),
    };

    let mut species: Vec<String> = captures.iter().map(|c| c.species.clone()).collect();
    species.sort_by_key(|s| s.to_lowercase());
    species.dedup();

    let top_species_label = top_by_count(captures.iter().map(|c| c.species.as_str()))
        .map(|(name, count)| format!("{name} ({count})"))
        .unwrap_or_default();

    let new_species: Vec<&str> = species
        .iter()
        .filter(|sp| first_seen_day_by_species.get(sp.as_str()) == Some(&day))
        .map(|s| s.as_str())
        .collect();
    let has_new_species = !new_species.is_empty();
    let new_species_label = if has_new_species {
        new_species.join(", ")
    } else {
        "None".to_string()
    };

    let location_title = labels::location_title(&captures, &cluster.centroid, config.title_dedup_miles);
    let locations = labels::detail_locations(&captures);

    let images: Vec<TripImage> = captures.iter().map(image_for).collect();
    // Captures are time-sorted, so the chronologically last one is the cover.
    let cover = images.last().cloned().unwrap_or_default();
    let map_href = format!(
        "map.html?species={}&photo={}",
        encode_query(&cover.species),
        encode_query(&cover.filename)
    );

    Trip {
        id: String::new(),
        day_key: day,
        date_label: format_date(day),
        time_range,
        duration_label: duration,
        image_count: images.len(),
        species_count: species.len(),
        gear_label: gear_label(&captures),
        top_species_label,
        has_new_species,
        new_species_label,
        species,
        location_title,
        locations,
        centroid: cluster.centroid,
        max_spread_km: cluster.max_spread_km,
        cover,
        map_href,
        images,
    }
}
