//! Phase 4 scoring and Phase 5 thresholding/labeling. Spec §4.9.

use muster_common::types::EventRaw;

use crate::blocking::ScoreMethod;
use crate::normalize::normalize_text;
use crate::similarity::{city_similarity, organizer_similarity, title_similarity, venue_distance};

pub const REVIEW_THRESHOLD: f64 = 0.60;
pub const LIKELY_THRESHOLD: f64 = 0.78;
pub const HIGHLY_LIKELY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct Scored {
    pub score: f64,
    pub label: Option<&'static str>,
    pub reasons: Vec<&'static str>,
}

fn delta_minutes(a: &EventRaw, b: &EventRaw) -> f64 {
    (b.start_datetime - a.start_datetime).num_seconds().unsigned_abs() as f64 / 60.0
}

fn venue_score_base(distance_km: Option<f64>) -> f64 {
    match distance_km {
        None => 0.0,
        Some(d) if d <= 1.0 => 1.0,
        Some(d) if d <= 5.0 => 1.0 - (d - 1.0) / 4.0,
        Some(_) => 0.0,
    }
}

fn venue_score_same_time(distance_km: Option<f64>) -> f64 {
    match distance_km {
        None => 0.0,
        Some(d) if d <= 0.5 => 1.0,
        Some(d) if d <= 2.0 => 0.8,
        Some(d) if d <= 5.0 => 0.5,
        Some(_) => 0.0,
    }
}

fn title_sim(a: &EventRaw, b: &EventRaw) -> f64 {
    if a.title.is_empty() || b.title.is_empty() {
        return 0.0;
    }
    title_similarity(&a.title, &b.title)
}

fn organizer_sim(a: &EventRaw, b: &EventRaw) -> f64 {
    match (a.organizer.as_deref(), b.organizer.as_deref()) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => organizer_similarity(x, y),
        _ => 0.0,
    }
}

fn category_match(a: &EventRaw, b: &EventRaw) -> bool {
    match (a.category.as_deref(), b.category.as_deref()) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => normalize_text(x) == normalize_text(y),
        _ => false,
    }
}

/// Base scorer (Phase-1 candidates).
pub fn score_base(a: &EventRaw, b: &EventRaw) -> Scored {
    let title_score = title_sim(a, b);
    let dt = delta_minutes(a, b);
    let time_score = (1.0 - dt / 180.0).max(0.0);
    let distance = venue_distance(a.lat, a.lon, b.lat, b.lon, a.venue_name.as_deref(), b.venue_name.as_deref());
    let venue_score = venue_score_base(distance);
    let org_sim = organizer_sim(a, b);

    let score = 0.40 * title_score + 0.30 * time_score + 0.20 * venue_score + 0.10 * org_sim;

    let mut reasons = Vec::new();
    if dt <= 15.0 {
        reasons.push("same start time");
    }
    if venue_score >= 0.8 {
        reasons.push("same venue");
    }
    if title_score > 0.8 {
        reasons.push("similar title");
    }
    if org_sim > 0.8 {
        reasons.push("same organizer");
    }
    if a.source_id != b.source_id {
        reasons.push("cross-source match");
    }

    Scored { score: score.min(1.0), label: label_for(score, ScoreMethod::Base), reasons }
}

/// Same-time scorer (Phase-2 candidates). `phase2_candidates` only ever
/// emits cross-source pairs, but the cross-source bonus is still gated
/// here on `source_id` rather than assumed, so the scorer enforces the
/// cross-source-bias invariant (spec §8 invariant #7) on its own rather
/// than relying on its caller's blocking behavior.
pub fn score_same_time(a: &EventRaw, b: &EventRaw) -> Scored {
    let title_score = title_sim(a, b);
    let dt = delta_minutes(a, b);
    let time_score = if dt <= 15.0 { 1.0 } else { (1.0 - dt / 60.0).max(0.0) };
    let distance = venue_distance(a.lat, a.lon, b.lat, b.lon, a.venue_name.as_deref(), b.venue_name.as_deref());
    let venue_score = venue_score_same_time(distance);
    let org_sim = organizer_sim(a, b);

    let city_sim = match (&a.city, &b.city) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => city_similarity(x, y),
        _ => 0.0,
    };
    let same_category = category_match(a, b);
    let cross_source = a.source_id != b.source_id;

    let base_weighted = 0.40 * title_score + 0.30 * time_score + 0.20 * venue_score + 0.10 * org_sim;
    let mut bonus = 0.0;
    if cross_source {
        bonus += 0.02;
    }
    if city_sim > 0.8 {
        bonus += 0.05;
    }
    if same_category {
        bonus += 0.03;
    }

    let score = (base_weighted + bonus).min(1.0);

    let mut reasons = Vec::new();
    if cross_source {
        reasons.push("cross-source match");
    }
    if dt <= 15.0 {
        reasons.push("same start time");
    }
    if venue_score >= 0.8 {
        reasons.push("same venue");
    }
    if title_score > 0.8 {
        reasons.push("similar title");
    }
    if city_sim > 0.8 {
        reasons.push("same city");
    }
    if same_category {
        reasons.push("same category");
    }

    Scored { score, label: label_for(score, ScoreMethod::SameTime), reasons }
}

fn label_for(score: f64, method: ScoreMethod) -> Option<&'static str> {
    if method == ScoreMethod::SameTime && score >= HIGHLY_LIKELY_THRESHOLD {
        Some("highly_likely_same_event")
    } else if score >= LIKELY_THRESHOLD {
        Some("likely")
    } else if score >= REVIEW_THRESHOLD {
        None
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use muster_common::{EventRawId, RunId, SourceId};

    fn ev(source_id: SourceId, title: &str, minute_offset: i64) -> EventRaw {
        EventRaw {
            id: EventRawId::new(),
            source_id,
            run_id: RunId::new(),
            source_event_id: None,
            title: title.into(),
            description_html: None,
            start_datetime: Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0).unwrap() + chrono::Duration::minutes(minute_offset),
            end_datetime: None,
            timezone: "UTC".into(),
            venue_name: None,
            venue_address: None,
            city: None,
            region: None,
            country: None,
            lat: None,
            lon: None,
            organizer: None,
            category: None,
            price: None,
            tags: Default::default(),
            url: "https://example.com".into(),
            image_url: None,
            scraped_at: Utc::now(),
            raw: serde_json::json!({}),
            content_hash: "hash".into(),
        }
    }

    #[test]
    fn identical_title_and_time_scores_near_one() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let a = ev(s1, "Summer Jazz Fest", 0);
        let b = ev(s2, "Summer Jazz Fest", 0);
        let scored = score_base(&a, &b);
        assert!(scored.score > 0.9, "got {}", scored.score);
    }

    #[test]
    fn same_time_scorer_applies_cross_source_bonus() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let a = ev(s1, "Summer Jazz Fest", 0);
        let b = ev(s2, "Summer Jazz Fest", 2);
        let scored = score_same_time(&a, &b);
        assert!(scored.reasons.contains(&"cross-source match"));
        assert!(scored.score > score_base(&a, &b).score - 0.1);
    }

    #[test]
    fn highly_likely_label_requires_same_time_method() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let a = ev(s1, "Night Market", 0);
        let b = ev(s2, "Night Market", 1);
        let scored = score_same_time(&a, &b);
        assert_eq!(scored.label, Some("highly_likely_same_event"));
    }

    #[test]
    fn empty_titles_score_zero_title_similarity_not_one() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let a = ev(s1, "", 0);
        let b = ev(s2, "", 0);
        assert_eq!(title_sim(&a, &b), 0.0);
        assert_eq!(organizer_sim(&a, &b), 0.0);
    }

    #[test]
    fn same_time_scorer_withholds_cross_source_bonus_for_same_source_pair() {
        let s1 = SourceId::new();
        let a = ev(s1, "Summer Jazz Fest", 0);
        let b = ev(s1, "Summer Jazz Fest", 2);
        let scored = score_same_time(&a, &b);
        assert!(!scored.reasons.contains(&"cross-source match"));

        let s2 = SourceId::new();
        let c = ev(s2, "Summer Jazz Fest", 2);
        let cross_source_scored = score_same_time(&a, &c);
        assert!(cross_source_scored.score > scored.score);
    }
}
