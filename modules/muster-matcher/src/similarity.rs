//! Phase 3 feature computation: title/organizer/city similarity and venue
//! distance. Spec §4.9.

use muster_common::geo::haversine_km;

use crate::normalize::{normalize_organizer, normalize_text, token_set};

/// `0.6 × token-set-ratio + 0.4 × Jaro-Winkler`, both over normalized
/// titles. Titles are normalized by the caller's choice of
/// `normalize_text`/`normalize_organizer`; this function takes raw strings
/// and normalizes them itself so every call site agrees on the rule.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    0.6 * token_set_ratio(&na, &nb) + 0.4 * strsim::jaro_winkler(&na, &nb)
}

pub fn organizer_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_organizer(a);
    let nb = normalize_organizer(b);
    strsim::jaro_winkler(&na, &nb)
}

pub fn city_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&normalize_text(a), &normalize_text(b))
}

pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&normalize_text(a), &normalize_text(b))
}

/// `venueDistance`: geodesic km if both have coordinates, else a
/// name-similarity-derived pseudo-distance, else undefined.
pub fn venue_distance(
    lat_a: Option<f64>,
    lon_a: Option<f64>,
    lat_b: Option<f64>,
    lon_b: Option<f64>,
    venue_a: Option<&str>,
    venue_b: Option<&str>,
) -> Option<f64> {
    match (lat_a, lon_a, lat_b, lon_b) {
        (Some(lat_a), Some(lon_a), Some(lat_b), Some(lon_b)) => {
            Some(haversine_km(lat_a, lon_a, lat_b, lon_b))
        }
        _ => match (venue_a, venue_b) {
            (Some(a), Some(b)) => Some((1.0 - name_similarity(a, b)) * 10.0),
            _ => None,
        },
    }
}

/// fuzzywuzzy-style token-set-ratio: split both strings into token sets,
/// build the shared-token string plus each side's leftover tokens, and take
/// the best pairwise `normalized_levenshtein` among the three combinations.
/// Robust to word reordering and one side having extra trailing words,
/// unlike a plain edit-distance ratio.
fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    let intersection: Vec<&String> = set_a.intersection(&set_b).collect();
    let only_a: Vec<&String> = set_a.difference(&set_b).collect();
    let only_b: Vec<&String> = set_b.difference(&set_a).collect();

    let common = join_sorted(&intersection);
    let combined_a = join_sorted_combined(&intersection, &only_a);
    let combined_b = join_sorted_combined(&intersection, &only_b);

    let candidates = [
        strsim::normalized_levenshtein(&common, &combined_a),
        strsim::normalized_levenshtein(&common, &combined_b),
        strsim::normalized_levenshtein(&combined_a, &combined_b),
    ];

    candidates.into_iter().fold(0.0_f64, f64::max)
}

fn join_sorted(tokens: &[&String]) -> String {
    let mut v: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v.join(" ")
}

fn join_sorted_combined(common: &[&String], rest: &[&String]) -> String {
    let mut v: Vec<&str> = common.iter().chain(rest.iter()).map(|s| s.as_str()).collect();
    v.sort_unstable();
    v.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_titles_score_one() {
        assert!((title_similarity("Summer Farmers Market", "Summer Farmers Market") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reordered_titles_score_high() {
        let s = title_similarity("Jazz Night at The Amp", "The Amp: Jazz Night");
        assert!(s > 0.7, "got {s}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = title_similarity("Farmers Market", "City Council Budget Hearing");
        assert!(s < 0.4, "got {s}");
    }

    #[test]
    fn venue_distance_prefers_coordinates() {
        let d = venue_distance(Some(44.9778), Some(-93.2650), Some(44.9537), Some(-93.0900), None, None);
        assert!(d.unwrap() > 0.0);
    }

    #[test]
    fn venue_distance_falls_back_to_name_similarity() {
        let d = venue_distance(None, None, None, None, Some("The Amp"), Some("the amp"));
        assert!(d.unwrap() < 1.0);
    }

    #[test]
    fn venue_distance_is_undefined_without_either() {
        assert!(venue_distance(None, None, None, None, None, None).is_none());
    }

    #[test]
    fn organizer_similarity_ignores_corp_suffixes() {
        let s = organizer_similarity("Acme Events LLC", "Acme Events");
        assert!((s - 1.0).abs() < 1e-9);
    }
}
