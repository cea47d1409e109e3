use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{SuggestionId, UserId};

use crate::error::RecommendError;
use crate::stats::{ItemStat, ItemStats};
use crate::suggestion::{Candidate, Suggestion, SuggestionSummary};

/// Weight of the recency component in the blended confidence.
pub const RECENCY_WEIGHT: f64 = 0.6;
/// Weight of the frequency component in the blended confidence.
pub const FREQUENCY_WEIGHT: f64 = 0.4;

/// Ranker tuning knobs. Defaults: top 10, threshold 0.15, saturation 5, prior 0.2, no unit cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Maximum candidates per suggestion.
    pub top_k: usize,
    /// Candidates scoring below this are excluded.
    pub min_confidence: f64,
    /// Purchase count at which the frequency score saturates at 1.
    pub frequency_saturation: u32,
    /// Recency score for items bought only once.
    pub single_purchase_prior: f64,
    /// Optional cap on total suggested units; lowest-confidence candidates go first.
    pub max_total_units: Option<u32>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_confidence: 0.15,
            frequency_saturation: 5,
            single_purchase_prior: 0.2,
            max_total_units: None,
        }
    }
}

impl RankerConfig {
    pub fn validate(&self) -> Result<(), RecommendError> {
        if self.top_k == 0 {
            return Err(RecommendError::InvalidConfig("top_k must be >= 1".to_string()));
        }
        if !(self.min_confidence.is_finite() && (0.0..=1.0).contains(&self.min_confidence)) {
            return Err(RecommendError::InvalidConfig(
                "min_confidence must be within [0, 1]".to_string(),
            ));
        }
        if self.frequency_saturation == 0 {
            return Err(RecommendError::InvalidConfig(
                "frequency_saturation must be >= 1".to_string(),
            ));
        }
        if !(self.single_purchase_prior.is_finite()
            && (0.0..=1.0).contains(&self.single_purchase_prior))
        {
            return Err(RecommendError::InvalidConfig(
                "single_purchase_prior must be within [0, 1]".to_string(),
            ));
        }
        if self.max_total_units == Some(0) {
            return Err(RecommendError::InvalidConfig(
                "max_total_units must be >= 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why no suggestion was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSuggestionReason {
    /// Cold start: the user has no usable order history.
    EmptyHistory,
    /// History exists but every item scored below the threshold.
    NothingConfident,
    /// Every confident item was dropped by the unit cap.
    UnitCapExceeded,
}

/// Result of ranking: either a non-empty suggestion or an explicit "nothing to suggest".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RankOutcome {
    Suggested {
        suggestion: Suggestion,
        summary: SuggestionSummary,
    },
    NoSuggestion {
        reason: NoSuggestionReason,
        summary: SuggestionSummary,
    },
}

impl RankOutcome {
    pub fn suggestion(&self) -> Option<&Suggestion> {
        match self {
            RankOutcome::Suggested { suggestion, .. } => Some(suggestion),
            RankOutcome::NoSuggestion { .. } => None,
        }
    }

    pub fn into_suggestion(self) -> Option<Suggestion> {
        match self {
            RankOutcome::Suggested { suggestion, .. } => Some(suggestion),
            RankOutcome::NoSuggestion { .. } => None,
        }
    }

    pub fn no_suggestion_reason(&self) -> Option<NoSuggestionReason> {
        match self {
            RankOutcome::Suggested { .. } => None,
            RankOutcome::NoSuggestion { reason, .. } => Some(*reason),
        }
    }

    pub fn summary(&self) -> &SuggestionSummary {
        match self {
            RankOutcome::Suggested { summary, .. } | RankOutcome::NoSuggestion { summary, .. } => {
                summary
            }
        }
    }
}

/// `exp(-days_since / interval)`, or the prior when the interval is undefined.
///
/// A zero interval (repeat orders at the same instant) is the limit of the
/// decay: 1 while `days_since` is 0, 0 afterwards.
/// Non-increasing in `days_since` for a fixed interval.
pub fn recency_score(days_since: f64, mean_interval_days: Option<f64>, prior: f64) -> f64 {
    let days_since = days_since.max(0.0);
    match mean_interval_days {
        Some(interval) if interval > 0.0 => (-days_since / interval).exp(),
        Some(_) => {
            if days_since == 0.0 {
                1.0
            } else {
                0.0
            }
        }
        None => prior,
    }
}

/// `min(1, purchase_count / saturation)`.
pub fn frequency_score(purchase_count: u32, saturation: u32) -> f64 {
    let saturation = saturation.max(1);
    (f64::from(purchase_count) / f64::from(saturation)).min(1.0)
}

/// Suggestion ranker: item statistics in, ordered candidates out.
///
/// Model:
/// - `confidence = 0.6 * recency + 0.4 * frequency`, clamped to [0, 1].
/// - Drop below `min_confidence`, sort descending (ties by item id), keep `top_k`.
/// - Optionally shed lowest-confidence candidates until `max_total_units` fits.
#[derive(Debug, Clone)]
pub struct SuggestionRanker {
    config: RankerConfig,
}

impl SuggestionRanker {
    pub fn new(config: RankerConfig) -> Result<Self, RecommendError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Blended confidence of one item at `now`.
    pub fn confidence(&self, stat: &ItemStat, now: DateTime<Utc>) -> f64 {
        let recency = recency_score(
            stat.days_since_last_purchase(now),
            stat.mean_interval_days,
            self.config.single_purchase_prior,
        );
        let frequency = frequency_score(stat.purchase_count, self.config.frequency_saturation);
        (RECENCY_WEIGHT * recency + FREQUENCY_WEIGHT * frequency).clamp(0.0, 1.0)
    }

    /// Rank with a freshly generated suggestion id.
    pub fn rank(&self, stats: &ItemStats, now: DateTime<Utc>) -> RankOutcome {
        self.rank_with_id(SuggestionId::new(), stats, now)
    }

    /// Rank, assigning `suggestion_id` if a suggestion results.
    pub fn rank_with_id(
        &self,
        suggestion_id: SuggestionId,
        stats: &ItemStats,
        now: DateTime<Utc>,
    ) -> RankOutcome {
        let mut summary = SuggestionSummary {
            items_analyzed: stats.len(),
            single_purchase_items: stats.iter().filter(|s| s.is_single_purchase()).count(),
            ..SuggestionSummary::default()
        };

        if stats.is_empty() {
            return RankOutcome::NoSuggestion {
                reason: NoSuggestionReason::EmptyHistory,
                summary,
            };
        }

        let mut candidates: Vec<Candidate> = Vec::with_capacity(stats.len());
        for stat in stats.iter() {
            let confidence = self.confidence(stat, now);
            if confidence < self.config.min_confidence {
                summary.below_threshold += 1;
                continue;
            }
            candidates.push(Candidate {
                item_id: stat.item_id.clone(),
                quantity: stat.modal_quantity.max(1),
                confidence,
            });
        }

        if candidates.is_empty() {
            return RankOutcome::NoSuggestion {
                reason: NoSuggestionReason::NothingConfident,
                summary,
            };
        }

        candidates.sort_by(by_confidence_desc);

        if candidates.len() > self.config.top_k {
            summary.truncated_by_top_k = candidates.len() - self.config.top_k;
            candidates.truncate(self.config.top_k);
        }

        if let Some(cap) = self.config.max_total_units {
            let cap = u64::from(cap);
            let mut total: u64 = candidates.iter().map(|c| u64::from(c.quantity)).sum();
            while total > cap {
                match candidates.pop() {
                    Some(dropped) => {
                        total -= u64::from(dropped.quantity);
                        summary.dropped_by_unit_cap += 1;
                    }
                    None => break,
                }
            }
        }

        summary.total_units = candidates.iter().map(|c| u64::from(c.quantity)).sum();

        match Suggestion::new(suggestion_id, stats.user_id(), now, candidates) {
            Ok(suggestion) => RankOutcome::Suggested {
                suggestion,
                summary,
            },
            Err(_) => RankOutcome::NoSuggestion {
                reason: NoSuggestionReason::UnitCapExceeded,
                summary,
            },
        }
    }

    /// Convenience for callers holding a user id but no statistics yet.
    pub fn cold_start(&self, user_id: UserId, now: DateTime<Utc>) -> RankOutcome {
        self.rank(&ItemStats::empty(user_id), now)
    }
}

fn by_confidence_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.item_id.cmp(&b.item_id))
}
