use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{DomainError, DomainResult, ItemId, SuggestionId, UserId};
use reorder_orders::OrderLine;

/// One proposed reorder line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub item_id: ItemId,
    pub quantity: u32,
    /// Likelihood the item is wanted now, in [0, 1].
    pub confidence: f64,
}

impl Candidate {
    /// The line that would be ordered if this candidate is accepted as-is.
    pub fn as_order_line(&self) -> OrderLine {
        OrderLine {
            item_id: self.item_id.clone(),
            quantity: self.quantity,
        }
    }
}

/// Ranked reorder candidates for one user, produced by the ranker.
///
/// Never empty: an empty ranking is reported as "no suggestion" instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    suggestion_id: SuggestionId,
    user_id: UserId,
    generated_at: DateTime<Utc>,
    candidates: Vec<Candidate>,
}

impl Suggestion {
    pub fn new(
        suggestion_id: SuggestionId,
        user_id: UserId,
        generated_at: DateTime<Utc>,
        candidates: Vec<Candidate>,
    ) -> DomainResult<Self> {
        if candidates.is_empty() {
            return Err(DomainError::validation("suggestion must contain at least one candidate"));
        }
        if let Some(c) = candidates
            .iter()
            .find(|c| c.quantity == 0 || !(0.0..=1.0).contains(&c.confidence))
        {
            return Err(DomainError::validation(format!(
                "candidate {} has quantity {} and confidence {}",
                c.item_id, c.quantity, c.confidence
            )));
        }

        Ok(Self {
            suggestion_id,
            user_id,
            generated_at,
            candidates,
        })
    }

    pub fn suggestion_id(&self) -> SuggestionId {
        self.suggestion_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Candidates by descending confidence.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.candidates.iter().map(Candidate::as_order_line).collect()
    }

    pub fn total_units(&self) -> u64 {
        self.candidates.iter().map(|c| u64::from(c.quantity)).sum()
    }
}

/// Counts describing how a ranking was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSummary {
    /// Distinct items with statistics.
    pub items_analyzed: usize,
    /// Items bought only once (scored with the fixed prior).
    pub single_purchase_items: usize,
    /// Items excluded for confidence below the threshold.
    pub below_threshold: usize,
    /// Items cut by the top-K limit.
    pub truncated_by_top_k: usize,
    /// Items dropped to respect the total unit cap.
    pub dropped_by_unit_cap: usize,
    /// Units across the surviving candidates.
    pub total_units: u64,
}
