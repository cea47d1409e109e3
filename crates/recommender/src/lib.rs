//! `reorder-recommender`
//!
//! **Responsibility:** turn order history into ranked reorder suggestions.
//!
//! - [`PatternExtractor`] derives per-item purchase statistics.
//! - [`SuggestionRanker`] scores, filters and orders candidates.
//!
//! Both are pure: no IO, no shared mutable state, safe to run concurrently
//! for different users. This crate never places or authorizes orders.

pub mod error;
pub mod extract;
pub mod rank;
pub mod stats;
pub mod suggestion;

pub use error::RecommendError;
pub use extract::PatternExtractor;
pub use rank::{
    FREQUENCY_WEIGHT, NoSuggestionReason, RECENCY_WEIGHT, RankOutcome,
    RankerConfig, SuggestionRanker, frequency_score, recency_score,
};
pub use stats::{ItemStat, ItemStats};
pub use suggestion::{Candidate, Suggestion, SuggestionSummary};
