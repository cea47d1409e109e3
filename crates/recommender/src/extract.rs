use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use reorder_core::{ItemId, UserId};
use reorder_orders::OrderRecord;

use crate::stats::{ItemStat, ItemStats};

/// Pattern extractor: order history in, per-item statistics out.
///
/// Model:
/// - Each order contributes one purchase per distinct item (repeated lines summed).
/// - Interval = (last - first) / (purchases - 1), in fractional days.
/// - Suggested quantity = modal per-order quantity.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

/// One purchase of one item: when, and how many units in that order.
#[derive(Debug, Clone, Copy)]
struct Purchase {
    at: DateTime<Utc>,
    quantity: u32,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Derive statistics for `user_id` from `records`.
    ///
    /// Records of other users are ignored. Input order does not matter;
    /// records are processed by `(timestamp, order_id)`.
    pub fn extract(&self, user_id: UserId, records: &[OrderRecord]) -> ItemStats {
        let mut ordered: Vec<&OrderRecord> =
            records.iter().filter(|r| r.user_id() == user_id).collect();
        if ordered.is_empty() {
            return ItemStats::empty(user_id);
        }
        ordered.sort_by(|a, b| (a.timestamp(), a.order_id()).cmp(&(b.timestamp(), b.order_id())));

        let mut purchases: HashMap<&ItemId, Vec<Purchase>> = HashMap::new();
        for record in ordered.iter().copied() {
            for (item_id, quantity) in record.item_quantities() {
                purchases.entry(item_id).or_default().push(Purchase {
                    at: record.timestamp(),
                    quantity,
                });
            }
        }

        let items: BTreeMap<ItemId, ItemStat> = purchases
            .into_iter()
            .filter_map(|(item_id, history)| {
                item_stat(user_id, item_id, &history).map(|stat| (item_id.clone(), stat))
            })
            .collect();

        ItemStats::from_map(user_id, items)
    }
}

fn item_stat(user_id: UserId, item_id: &ItemId, history: &[Purchase]) -> Option<ItemStat> {
    let first = history.first()?;
    let last = history.last()?;
    let purchase_count = u32::try_from(history.len()).unwrap_or(u32::MAX);

    let mean_interval_days = if history.len() < 2 {
        None
    } else {
        let span_days = (last.at - first.at).num_milliseconds() as f64 / 86_400_000.0;
        Some(span_days / (history.len() - 1) as f64)
    };

    Some(ItemStat {
        user_id,
        item_id: item_id.clone(),
        purchase_count,
        first_purchased_at: first.at,
        last_purchased_at: last.at,
        mean_interval_days,
        modal_quantity: modal_quantity(history),
    })
}

/// Most frequent quantity; among tied quantities, the one seen most recently.
///
/// `history` is chronological, so the latest index of a quantity is its
/// most recent occurrence.
fn modal_quantity(history: &[Purchase]) -> u32 {
    // quantity -> (occurrences, index of latest occurrence)
    let mut tally: HashMap<u32, (usize, usize)> = HashMap::new();
    for (idx, p) in history.iter().enumerate() {
        let entry = tally.entry(p.quantity).or_insert((0, idx));
        entry.0 += 1;
        entry.1 = idx;
    }

    tally
        .into_iter()
        .max_by_key(|(_, (count, latest))| (*count, *latest))
        .map(|(qty, _)| qty)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use reorder_core::OrderId;
    use reorder_orders::OrderLine;

    fn item(id: &str) -> ItemId {
        id.parse().unwrap()
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn order(user: UserId, at: DateTime<Utc>, lines: &[(&str, u32)]) -> OrderRecord {
        let lines = lines
            .iter()
            .map(|(id, qty)| OrderLine::new(item(id), *qty).unwrap())
            .collect();
        OrderRecord::new(user, OrderId::new(), at, lines).unwrap()
    }

    #[test]
    fn zero_orders_yield_empty_stats() {
        let user = UserId::new();
        let stats = PatternExtractor::new().extract(user, &[]);
        assert!(stats.is_empty());
        assert_eq!(stats.user_id(), user);
    }

    #[test]
    fn weekly_orders_produce_seven_day_interval() {
        let user = UserId::new();
        let records: Vec<OrderRecord> = (0..3)
            .map(|i| {
                order(
                    user,
                    base_time() + Duration::days(7 * i),
                    &[("milk", 1), ("eggs", 1), ("bread", 2)],
                )
            })
            .collect();

        let stats = PatternExtractor::new().extract(user, &records);
        assert_eq!(stats.len(), 3);

        let bread = stats.get(&item("bread")).unwrap();
        assert_eq!(bread.purchase_count, 3);
        assert_eq!(bread.last_purchased_at, base_time() + Duration::days(14));
        assert!((bread.mean_interval_days.unwrap() - 7.0).abs() < 1e-9);
        assert_eq!(bread.modal_quantity, 2);
    }

    #[test]
    fn single_purchase_has_no_interval() {
        let user = UserId::new();
        let records = vec![
            order(user, base_time(), &[("milk", 1)]),
            order(user, base_time() + Duration::days(3), &[("milk", 1), ("jam", 1)]),
        ];

        let stats = PatternExtractor::new().extract(user, &records);
        let jam = stats.get(&item("jam")).unwrap();
        assert_eq!(jam.purchase_count, 1);
        assert!(jam.mean_interval_days.is_none());
        assert!(jam.is_single_purchase());
    }

    #[test]
    fn repeated_lines_count_as_one_purchase() {
        let user = UserId::new();
        let records = vec![order(user, base_time(), &[("milk", 1), ("milk", 2)])];

        let stats = PatternExtractor::new().extract(user, &records);
        let milk = stats.get(&item("milk")).unwrap();
        assert_eq!(milk.purchase_count, 1);
        assert_eq!(milk.modal_quantity, 3);
    }

    #[test]
    fn input_order_does_not_matter() {
        let user = UserId::new();
        let a = order(user, base_time(), &[("milk", 1)]);
        let b = order(user, base_time() + Duration::days(2), &[("milk", 2)]);
        let c = order(user, base_time() + Duration::days(6), &[("milk", 2)]);

        let forward = PatternExtractor::new().extract(user, &[a.clone(), b.clone(), c.clone()]);
        let shuffled = PatternExtractor::new().extract(user, &[c, a, b]);
        assert_eq!(forward, shuffled);

        let milk = forward.get(&item("milk")).unwrap();
        assert!((milk.mean_interval_days.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn other_users_records_are_ignored() {
        let user = UserId::new();
        let records = vec![
            order(user, base_time(), &[("milk", 1)]),
            order(UserId::new(), base_time(), &[("beer", 6)]),
        ];

        let stats = PatternExtractor::new().extract(user, &records);
        assert_eq!(stats.len(), 1);
        assert!(stats.get(&item("beer")).is_none());
    }

    #[test]
    fn modal_quantity_prefers_most_frequent() {
        let user = UserId::new();
        let records = vec![
            order(user, base_time(), &[("eggs", 6)]),
            order(user, base_time() + Duration::days(1), &[("eggs", 6)]),
            order(user, base_time() + Duration::days(2), &[("eggs", 12)]),
        ];

        let stats = PatternExtractor::new().extract(user, &records);
        assert_eq!(stats.get(&item("eggs")).unwrap().modal_quantity, 6);
    }

    #[test]
    fn modal_quantity_tie_goes_to_most_recent_order() {
        let user = UserId::new();
        let records = vec![
            order(user, base_time(), &[("eggs", 12)]),
            order(user, base_time() + Duration::days(1), &[("eggs", 6)]),
            order(user, base_time() + Duration::days(2), &[("eggs", 12)]),
            order(user, base_time() + Duration::days(3), &[("eggs", 6)]),
        ];

        let stats = PatternExtractor::new().extract(user, &records);
        assert_eq!(stats.get(&item("eggs")).unwrap().modal_quantity, 6);
    }
}
