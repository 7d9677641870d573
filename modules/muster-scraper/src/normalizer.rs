//! Pure `RawEvent × defaultTimezone → EventRaw` transform. Spec §4.8.
//!
//! Deliberately free of any I/O or logger — the Scraper Runtime owns
//! deciding what to do with the warnings this returns (logging them,
//! counting them). Same inputs always produce the same `EventRaw`
//! bit-for-bit.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use muster_common::geo::{clamp_lat, clamp_lon};
use muster_common::types::{EventRaw, Source};
use muster_common::{EventRawId, PipelineError, RunId};
use sha2::{Digest, Sha256};

use crate::module::RawEvent;

/// A successfully normalized event plus any non-fatal observations the
/// caller should log (e.g. "dropped an implausible end time").
pub struct Normalized {
    pub event: EventRaw,
    pub warnings: Vec<String>,
}

const LOOSE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn normalize(
    raw: RawEvent,
    source: &Source,
    run_id: RunId,
    scraped_at: DateTime<Utc>,
) -> Result<Normalized, PipelineError> {
    let mut warnings = Vec::new();

    let tz = resolve_timezone(raw.timezone.as_deref(), &source.default_timezone, &mut warnings)?;

    let start_datetime = parse_datetime(&raw.start, tz)
        .map_err(|_| PipelineError::Validation(format!("unparseable start datetime: {}", raw.start)))?;

    let end_datetime = match raw.end.as_deref() {
        None => None,
        Some(raw_end) => match parse_datetime(raw_end, tz) {
            Err(_) => {
                warnings.push(format!("dropped unparseable end datetime: {raw_end}"));
                None
            }
            Ok(end) if end >= start_datetime => Some(end),
            Ok(end) => {
                // Wall-clock wrap: the event crosses midnight and the
                // module gave us a bare time without a date roll.
                let delta = start_datetime - end;
                if delta <= Duration::hours(6) {
                    let wrapped = end + Duration::days(1);
                    if wrapped >= start_datetime {
                        Some(wrapped)
                    } else {
                        warnings.push(format!(
                            "dropped implausible end datetime even after day-wrap: {raw_end}"
                        ));
                        None
                    }
                } else {
                    warnings.push(format!("dropped end datetime before start: {raw_end}"));
                    None
                }
            }
        },
    };

    let title = clean_string(&raw.title).unwrap_or_default();
    let venue_name = clean_string(raw.venue_name.as_deref().unwrap_or(""));
    let venue_address = clean_string(raw.venue_address.as_deref().unwrap_or(""));
    let city = clean_string(raw.city.as_deref().unwrap_or(""));
    let region = clean_string(raw.region.as_deref().unwrap_or(""));
    let country = clean_string(raw.country.as_deref().unwrap_or(""));
    let organizer = clean_string(raw.organizer.as_deref().unwrap_or(""));
    let category = clean_string(raw.category.as_deref().unwrap_or(""));
    let price = clean_string(raw.price.as_deref().unwrap_or(""));
    let image_url = clean_string(raw.image_url.as_deref().unwrap_or(""));
    let description_html = clean_string(raw.description_html.as_deref().unwrap_or(""));

    let lat = raw.lat.and_then(clamp_lat);
    let lon = raw.lon.and_then(clamp_lon);

    let tags: BTreeSet<String> = raw.tags.iter().filter_map(|t| clean_string(t)).collect();

    let content_hash = content_hash(&title, start_datetime, venue_name.as_deref(), city.as_deref(), &raw.url);

    let event = EventRaw {
        id: EventRawId::new(),
        source_id: source.id,
        run_id,
        source_event_id: raw.source_event_id.and_then(|s| clean_string(&s)),
        title,
        description_html,
        start_datetime,
        end_datetime,
        timezone: tz.to_string(),
        venue_name,
        venue_address,
        city,
        region,
        country,
        lat,
        lon,
        organizer,
        category,
        price,
        tags,
        url: raw.url,
        image_url,
        scraped_at,
        raw: raw.raw,
        content_hash,
    };

    Ok(Normalized { event, warnings })
}

fn resolve_timezone(raw_tz: Option<&str>, default_tz: &str, warnings: &mut Vec<String>) -> Result<Tz, PipelineError> {
    if let Some(tz_str) = raw_tz {
        if let Ok(tz) = Tz::from_str(tz_str) {
            return Ok(tz);
        }
        warnings.push(format!("invalid IANA timezone '{tz_str}', falling back to source default"));
    }
    Tz::from_str(default_tz)
        .map_err(|_| PipelineError::Validation(format!("source default timezone is invalid: {default_tz}")))
}

fn parse_datetime(s: &str, tz: Tz) -> Result<DateTime<Utc>, ()> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in LOOSE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            if let Some(local) = local_from_naive(tz, naive) {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }

    Err(())
}

fn local_from_naive(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earliest, _latest) => Some(earliest),
        chrono::LocalResult::None => None,
    }
}

fn clean_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn content_hash(
    title: &str,
    start_datetime: DateTime<Utc>,
    venue_name: Option<&str>,
    city: Option<&str>,
    url: &str,
) -> String {
    let host_path = url::Url::parse(url)
        .ok()
        .map(|u| format!("{}{}", u.host_str().unwrap_or(""), u.path()))
        .unwrap_or_else(|| url.to_string());

    let key = format!(
        "{}|{}|{}|{}|{}",
        title.to_lowercase(),
        start_datetime.to_rfc3339(),
        venue_name.unwrap_or("").to_lowercase(),
        city.unwrap_or("").to_lowercase(),
        host_path.to_lowercase(),
    );

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_common::types::SourceType;
    use muster_common::SourceId;

    fn test_source() -> Source {
        Source {
            id: SourceId::new(),
            name: "Test Source".into(),
            base_url: "https://example.com".into(),
            module_key: "generic_calendar".into(),
            active: true,
            default_timezone: "America/Chicago".into(),
            rate_limit_per_min: 10,
            source_type: SourceType::Website,
            instagram_username: None,
            notes: None,
        }
    }

    fn raw(title: &str, start: &str, end: Option<&str>) -> RawEvent {
        RawEvent {
            title: title.into(),
            start: start.into(),
            end: end.map(String::from),
            url: "https://example.com/events/1".into(),
            raw: serde_json::json!({}),
            ..Default::default()
        }
    }

    #[test]
    fn same_raw_event_normalizes_bit_for_bit() {
        let source = test_source();
        let run_id = RunId::new();
        let scraped_at = Utc::now();

        let a = normalize(raw("Farmers Market", "2026-06-01T09:00:00", None), &source, run_id, scraped_at)
            .unwrap();
        let b = normalize(raw("Farmers Market", "2026-06-01T09:00:00", None), &source, run_id, scraped_at)
            .unwrap();
        assert_eq!(a.event.content_hash, b.event.content_hash);
        assert_eq!(a.event.start_datetime, b.event.start_datetime);
    }

    #[test]
    fn iso_without_offset_uses_source_default_timezone() {
        let source = test_source();
        let n = normalize(raw("Show", "2026-06-01T20:00:00", None), &source, RunId::new(), Utc::now())
            .unwrap();
        // 2026-06-01T20:00 America/Chicago (CDT, UTC-5) == 2026-06-02T01:00Z
        assert_eq!(n.event.start_datetime.to_rfc3339(), "2026-06-02T01:00:00+00:00");
        assert_eq!(n.event.timezone, "America/Chicago");
    }

    #[test]
    fn end_before_start_within_six_hours_wraps_a_day() {
        let source = test_source();
        let n = normalize(
            raw("Late Show", "2026-06-01T23:00:00", Some("2026-06-01T01:00:00")),
            &source,
            RunId::new(),
            Utc::now(),
        )
        .unwrap();
        assert!(n.event.end_datetime.is_some());
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn end_far_before_start_is_dropped_with_warning() {
        let source = test_source();
        let n = normalize(
            raw("Weird Event", "2026-06-01T23:00:00", Some("2026-05-30T01:00:00")),
            &source,
            RunId::new(),
            Utc::now(),
        )
        .unwrap();
        assert!(n.event.end_datetime.is_none());
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn invalid_source_timezone_override_falls_back_to_source_default() {
        let source = test_source();
        let mut r = raw("Show", "2026-06-01T20:00:00", None);
        r.timezone = Some("Not/AZone".into());
        let n = normalize(r, &source, RunId::new(), Utc::now()).unwrap();
        assert_eq!(n.event.timezone, "America/Chicago");
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn unparseable_start_is_rejected() {
        let source = test_source();
        let result = normalize(raw("Bad", "not a date", None), &source, RunId::new(), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn lat_lon_out_of_range_are_clamped() {
        let source = test_source();
        let mut r = raw("Show", "2026-06-01T20:00:00", None);
        r.lat = Some(200.0);
        r.lon = Some(-200.0);
        let n = normalize(r, &source, RunId::new(), Utc::now()).unwrap();
        assert_eq!(n.event.lat, Some(90.0));
        assert_eq!(n.event.lon, Some(-180.0));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let source = test_source();
        let mut r = raw("Show", "2026-06-01T20:00:00", None);
        r.venue_name = Some("   ".into());
        let n = normalize(r, &source, RunId::new(), Utc::now()).unwrap();
        assert_eq!(n.event.venue_name, None);
    }
}
