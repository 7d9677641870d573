//! Phase 1 (cheap pairwise blocking) and Phase 2 (same-time clustering)
//! candidate generation. Spec §4.9.

use std::collections::HashMap;

use muster_common::types::EventRaw;

use crate::normalize::normalize_text;
use crate::similarity::{name_similarity, title_similarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMethod {
    Base,
    SameTime,
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub a: usize,
    pub b: usize,
    pub method: ScoreMethod,
}

fn delta_minutes(a: &EventRaw, b: &EventRaw) -> f64 {
    (b.start_datetime - a.start_datetime).num_seconds().unsigned_abs() as f64 / 60.0
}

fn is_trivially_same(a: &EventRaw, b: &EventRaw) -> bool {
    a.source_id == b.source_id
        && matches!((&a.source_event_id, &b.source_event_id), (Some(x), Some(y)) if !x.is_empty() && x == y)
}

/// Phase 1. `events` must be sorted ascending by `start_datetime` — the
/// window cutoff relies on it to stop scanning early.
pub fn phase1_candidates(events: &[EventRaw], window_days: i64) -> Vec<Candidate> {
    let mut out = Vec::new();
    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            let a = &events[i];
            let b = &events[j];

            let date_delta = (b.start_datetime.date_naive() - a.start_datetime.date_naive()).num_days();
            if date_delta > window_days {
                break; // sorted ascending: nothing further in range either.
            }
            if is_trivially_same(a, b) {
                continue;
            }

            if passes_phase1(a, b) {
                out.push(Candidate { a: i, b: j, method: ScoreMethod::Base });
            }
        }
    }
    out
}

fn passes_phase1(a: &EventRaw, b: &EventRaw) -> bool {
    let same_day = a.start_datetime.date_naive() == b.start_datetime.date_naive();
    let cross_source = a.source_id != b.source_id;
    let dt = delta_minutes(a, b);

    let same_city = match (&a.city, &b.city) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => normalize_text(x) == normalize_text(y),
        _ => false,
    };

    let venue_fuzzy_match = match (&a.venue_name, &b.venue_name) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => name_similarity(x, y) >= 0.8,
        _ => false,
    };

    // Rule 1
    if same_day && same_city && dt <= 30.0 {
        return true;
    }
    // Rule 2
    if same_day && venue_fuzzy_match {
        return true;
    }
    // Rules 3-5 need title similarity; compute once, lazily.
    let title_sim = title_similarity(&a.title, &b.title);
    if title_sim > 0.7 && dt <= 60.0 {
        return true;
    }
    if cross_source && dt <= 15.0 {
        return true;
    }
    if cross_source && same_day && title_sim > 0.8 {
        return true;
    }

    false
}

/// Phase 2: bucket into 15-minute UTC slots, then pair up cross-source
/// events sharing a slot. Additive to Phase 1 — the same pair can appear in
/// both sets; `Phase 6` dedupes by highest score.
pub fn phase2_candidates(events: &[EventRaw]) -> Vec<Candidate> {
    const SLOT_MINUTES: i64 = 15;

    let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
    for (idx, ev) in events.iter().enumerate() {
        let slot = ev.start_datetime.timestamp() / 60 / SLOT_MINUTES;
        buckets.entry(slot).or_default().push(idx);
    }

    let mut out = Vec::new();
    for members in buckets.values() {
        if members.len() < 2 {
            continue;
        }
        let distinct_sources: std::collections::HashSet<_> = members.iter().map(|&i| events[i].source_id).collect();
        if distinct_sources.len() < 2 {
            continue;
        }
        for x in 0..members.len() {
            for y in (x + 1)..members.len() {
                let (i, j) = (members[x], members[y]);
                if events[i].source_id == events[j].source_id {
                    continue;
                }
                let (a, b) = if i < j { (i, j) } else { (j, i) };
                out.push(Candidate { a, b, method: ScoreMethod::SameTime });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use muster_common::{EventRawId, RunId, SourceId};

    fn ev(source_id: SourceId, title: &str, minute_offset: i64, city: Option<&str>) -> EventRaw {
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
            city: city.map(String::from),
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
    fn same_city_and_close_time_is_a_phase1_candidate() {
        let s = SourceId::new();
        let events = vec![ev(s, "Market A", 0, Some("Minneapolis")), ev(s, "Market B", 10, Some("Minneapolis"))];
        let candidates = phase1_candidates(&events, 7);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn far_apart_in_time_and_different_everything_is_not_a_candidate() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let events = vec![ev(s1, "Poetry Reading", 0, Some("Minneapolis")), ev(s2, "Car Show", 600, Some("Duluth"))];
        let candidates = phase1_candidates(&events, 7);
        assert!(candidates.is_empty());
    }

    #[test]
    fn trivially_same_source_event_is_excluded() {
        let s = SourceId::new();
        let mut a = ev(s, "Market", 0, Some("Minneapolis"));
        let mut b = ev(s, "Market", 5, Some("Minneapolis"));
        a.source_event_id = Some("evt-1".into());
        b.source_event_id = Some("evt-1".into());
        let candidates = phase1_candidates(&[a, b], 7);
        assert!(candidates.is_empty());
    }

    #[test]
    fn same_time_bucket_cross_source_is_a_phase2_candidate() {
        let s1 = SourceId::new();
        let s2 = SourceId::new();
        let events = vec![ev(s1, "Show", 0, None), ev(s2, "Same Show", 5, None)];
        let candidates = phase2_candidates(&events);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn same_time_bucket_same_source_is_not_a_phase2_candidate() {
        let s = SourceId::new();
        let events = vec![ev(s, "Show", 0, None), ev(s, "Show Again", 5, None)];
        let candidates = phase2_candidates(&events);
        assert!(candidates.is_empty());
    }
}
