//! Trip title and location-detail derivation.
//!
//! ## Algorithm
//! 1. Group captures by normalized park/site label, then by city label
//! 2. Rank groups by member count, then by a quality score that prefers
//!    fuller, better-capitalized variants of the same place name
//! 3. Greedily select anchors, admitting a later candidate only if its
//!    centroid sits at least `title_dedup_miles` from every anchor already
//!    chosen
//! 4. Assemble the title from the anchors, deprioritizing generic
//!    administrative names ("Town of X", "X County")
//! 5. Fall back to free-form labels, then to raw centroid coordinates
//!
//! Reverse-geocoding caches return the same place under several spellings
//! ("harriman state park", "Harriman State Park "), so comparison always runs
//! on the normalized form while display keeps the best-scored original.

use std::collections::HashMap;

use crate::geo_utils;
use crate::{Capture, GeoPoint};

/// Max park/site anchors in a title.
const MAX_PARK_ANCHORS: usize = 2;
/// Max total labels in a title once city names are added.
const MAX_TITLE_LABELS: usize = 4;
/// Max free-form labels in the fallback title.
const MAX_FALLBACK_LABELS: usize = 2;

/// Normalize a place label for comparison: trim, collapse whitespace, unify
/// apostrophe variants, lowercase.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{2019}', '\u{02BC}', '`'], "'")
        .to_lowercase()
}

/// Quality score of a display variant: uppercase letters weigh ten times a
/// plain character, so "Harriman State Park" beats "harriman state park".
pub fn quality_score(label: &str) -> usize {
    let uppercase = label.chars().filter(|c| c.is_uppercase()).count();
    uppercase * 10 + label.chars().count()
}

/// Generic administrative names make poor titles ("Town of Ramapo" when the
/// park name is available). Checked on the normalized form.
pub fn is_generic_admin(normalized: &str) -> bool {
    normalized.starts_with("town of ")
        || normalized.starts_with("city of ")
        || normalized.ends_with(" county")
        || normalized.ends_with(" township")
}

/// One candidate place label: the best display variant seen, how many
/// captures carry it, and the centroid of its geotagged members.
#[derive(Debug, Clone)]
struct LabelGroup {
    display: String,
    normalized: String,
    count: usize,
    centroid: Option<GeoPoint>,
}

/// Group captures by a normalized label, keeping the best-quality display
/// variant and the centroid of each group's geotagged members. Output is
/// ranked by count desc, quality desc, then normalized form for determinism.
fn group_labels<'a, F>(captures: &'a [Capture], label_of: F) -> Vec<LabelGroup>
where
    F: Fn(&'a Capture) -> Option<&'a str>,
{
    struct Acc {
        display: String,
        count: usize,
        coords: Vec<GeoPoint>,
    }

    let mut groups: HashMap<String, Acc> = HashMap::new();
    for capture in captures {
        let Some(raw) = label_of(capture) else { continue };
        let display = raw.trim();
        if display.is_empty() {
            continue;
        }
        let key = normalize_label(display);
        let entry = groups.entry(key).or_insert_with(|| Acc {
            display: display.to_string(),
            count: 0,
            coords: Vec::new(),
        });
        entry.count += 1;
        if quality_score(display) > quality_score(&entry.display) {
            entry.display = display.to_string();
        }
        if let Some(p) = capture.geo_point() {
            entry.coords.push(p);
        }
    }

    let mut ranked: Vec<LabelGroup> = groups
        .into_iter()
        .map(|(normalized, acc)| LabelGroup {
            centroid: geo_utils::centroid(&acc.coords),
            display: acc.display,
            normalized,
            count: acc.count,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| quality_score(&b.display).cmp(&quality_score(&a.display)))
            .then_with(|| a.normalized.cmp(&b.normalized))
    });
    ranked
}

/// True when the candidate's centroid keeps the minimum separation from
/// every already-chosen anchor. A candidate with no measurable centroid
/// passes; there is nothing to compare against.
fn far_from_all(candidate: &LabelGroup, chosen: &[LabelGroup], min_miles: f64) -> bool {
    let Some(c) = candidate.centroid else { return true };
    chosen.iter().all(|anchor| match anchor.centroid {
        Some(a) => geo_utils::haversine_miles(&a, &c) >= min_miles,
        None => true,
    })
}

/// Greedy anchor selection: the top-ranked group unconditionally, later ones
/// only if separated from everything already selected.
fn select_anchors(ranked: &[LabelGroup], max: usize, min_miles: f64) -> Vec<LabelGroup> {
    let mut chosen: Vec<LabelGroup> = Vec::new();
    for group in ranked {
        if chosen.len() >= max {
            break;
        }
        if chosen.is_empty() || far_from_all(group, &chosen, min_miles) {
            chosen.push(group.clone());
        }
    }
    chosen
}

/// Derive the trip's display title.
pub fn location_title(captures: &[Capture], trip_centroid: &GeoPoint, dedup_miles: f64) -> String {
    let parks = group_labels(captures, |c| c.park.as_deref());
    let cities: Vec<LabelGroup> = group_labels(captures, |c| c.city.as_deref())
        .into_iter()
        .filter(|g| !is_generic_admin(&g.normalized))
        .collect();

    let mut chosen = select_anchors(&parks, MAX_PARK_ANCHORS, dedup_miles);
    if !chosen.is_empty() {
        for city in &cities {
            if chosen.len() >= MAX_TITLE_LABELS {
                break;
            }
            if far_from_all(city, &chosen, dedup_miles) {
                chosen.push(city.clone());
            }
        }
    } else {
        chosen = select_anchors(&cities, MAX_PARK_ANCHORS, dedup_miles);
    }

    if !chosen.is_empty() {
        let preferred: Vec<&str> = chosen
            .iter()
            .filter(|g| !is_generic_admin(&g.normalized))
            .map(|g| g.display.as_str())
            .collect();
        let labels: Vec<&str> = if preferred.is_empty() {
            chosen.iter().map(|g| g.display.as_str()).collect()
        } else {
            preferred
        };
        return labels.join(", ");
    }

    // No park or city data at all: free-form labels, then raw coordinates.
    let free_form = group_labels(captures, |c| c.location_label.as_deref());
    if !free_form.is_empty() {
        return free_form
            .iter()
            .take(MAX_FALLBACK_LABELS)
            .map(|g| g.display.as_str())
            .collect::<Vec<_>>()
            .join(", ");
    }

    geo_utils::format_coords(trip_centroid)
}

/// Best single label for one capture: its own free-form label, else the
/// non-empty parts of "city, state, country", else its coordinates.
fn best_capture_label(capture: &Capture) -> Option<String> {
    if let Some(label) = capture.location_label.as_deref() {
        let trimmed = label.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    let parts: Vec<&str> = [&capture.city, &capture.state, &capture.country]
        .into_iter()
        .filter_map(|o| o.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !parts.is_empty() {
        return Some(parts.join(", "));
    }

    capture.geo_point().map(|p| geo_utils::format_coords(&p))
}

/// The deduplicated detail-location list shown alongside the title.
/// First-seen order, dedup on the normalized form.
pub fn detail_locations(captures: &[Capture]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();
    for capture in captures {
        let Some(label) = best_capture_label(capture) else { continue };
        let key = normalize_label(&label);
        if !seen.contains(&key) {
            seen.push(key);
            out.push(label);
        }
    }
    out
}
