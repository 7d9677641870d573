pub mod blocking;
pub mod matcher;
pub mod normalize;
pub mod scoring;
pub mod similarity;

pub use blocking::{Candidate, ScoreMethod};
pub use matcher::{Matcher, MatcherConfig, MatchRunOutcome};
pub use scoring::{Scored, HIGHLY_LIKELY_THRESHOLD, LIKELY_THRESHOLD, REVIEW_THRESHOLD};
