use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{ItemId, UserId};

/// Purchase statistics for one item in one user's history.
///
/// Derived data: recomputed from history, never a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStat {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Number of distinct orders containing the item.
    pub purchase_count: u32,
    pub first_purchased_at: DateTime<Utc>,
    pub last_purchased_at: DateTime<Utc>,
    /// Average gap between consecutive purchases, in fractional days.
    /// `None` until the item has been bought at least twice.
    pub mean_interval_days: Option<f64>,
    /// Most frequent per-order quantity (ties go to the most recently seen).
    pub modal_quantity: u32,
}

impl ItemStat {
    /// Fractional days between the last purchase and `now`, never negative.
    pub fn days_since_last_purchase(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.last_purchased_at).num_milliseconds();
        (millis as f64 / 86_400_000.0).max(0.0)
    }

    pub fn is_single_purchase(&self) -> bool {
        self.purchase_count < 2
    }
}

/// All item statistics for one user, keyed by item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    user_id: UserId,
    items: BTreeMap<ItemId, ItemStat>,
}

impl ItemStats {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: BTreeMap::new(),
        }
    }

    pub(crate) fn from_map(user_id: UserId, items: BTreeMap<ItemId, ItemStat>) -> Self {
        Self { user_id, items }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn get(&self, item_id: &ItemId) -> Option<&ItemStat> {
        self.items.get(item_id)
    }

    /// Statistics in item id order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemStat> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
