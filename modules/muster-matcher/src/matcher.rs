//! Top-level Matcher orchestration. Spec §4.9 end to end: blocking →
//! clustering → scoring → thresholding → dedup → persist.

use std::collections::HashMap;
use std::sync::Arc;

use futures::TryStreamExt;
use muster_common::types::EventRaw;
use muster_common::{EventRawId, PipelineError};
use muster_store::{EventMatchFilter, NewMatch, Store};
use tracing::info;

use crate::blocking::{phase1_candidates, phase2_candidates, Candidate, ScoreMethod};
use crate::scoring::{score_base, score_same_time, Scored, REVIEW_THRESHOLD};

const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Pairs farther apart than this (calendar days) are rejected outright
    /// in Phase 1. Spec default: 7.
    pub window_days: i64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { window_days: DEFAULT_WINDOW_DAYS }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchRunOutcome {
    pub events_considered: usize,
    pub candidates_scored: usize,
    pub matches_persisted: usize,
}

pub struct Matcher {
    store: Arc<dyn Store>,
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, config: MatcherConfig::default() }
    }

    pub fn with_config(store: Arc<dyn Store>, config: MatcherConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self, filter: EventMatchFilter) -> Result<MatchRunOutcome, PipelineError> {
        let mut events: Vec<EventRaw> = self.store.list_events_for_matching(filter).await?.try_collect().await?;
        events.sort_by_key(|e| e.start_datetime);

        let candidates: Vec<Candidate> = {
            let mut c = phase1_candidates(&events, self.config.window_days);
            c.extend(phase2_candidates(&events));
            c
        };

        let mut best: HashMap<(EventRawId, EventRawId), (f64, Scored)> = HashMap::new();
        for candidate in &candidates {
            let a = &events[candidate.a];
            let b = &events[candidate.b];
            let scored = match candidate.method {
                ScoreMethod::Base => score_base(a, b),
                ScoreMethod::SameTime => score_same_time(a, b),
            };
            if scored.score < REVIEW_THRESHOLD {
                continue;
            }

            let key = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
            best.entry(key)
                .and_modify(|existing| {
                    if scored.score > existing.0 {
                        *existing = (scored.score, scored.clone());
                    }
                })
                .or_insert((scored.score, scored));
        }

        let candidates_scored = best.len();
        let new_matches: Vec<NewMatch> = best
            .into_iter()
            .map(|((raw_id_a, raw_id_b), (score, scored))| NewMatch {
                raw_id_a,
                raw_id_b,
                score,
                reason: serde_json::json!({ "label": scored.label, "reasons": scored.reasons }),
            })
            .collect();

        let persisted = self.store.replace_open_matches(new_matches).await?;
        info!(
            events_considered = events.len(),
            candidates_scored,
            matches_persisted = persisted.len(),
            "match run finished"
        );

        Ok(MatchRunOutcome { events_considered: events.len(), candidates_scored, matches_persisted: persisted.len() })
    }
}
