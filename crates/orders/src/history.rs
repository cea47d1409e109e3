//! Raw history parsing.
//!
//! Stored history is a list of JSON payloads. Anything that does not turn
//! into a valid [`OrderRecord`] for the requested user is dropped and counted;
//! extraction proceeds with whatever remains.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value as JsonValue;

use reorder_core::{OrderId, UserId};

use crate::record::OrderRecord;

/// Why a raw record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Not an order record, or an order that fails validation.
    Malformed,
    /// A valid record that belongs to a different user.
    ForeignUser,
    /// A second record with an order id already seen.
    DuplicateOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRecord {
    /// Position in the raw input.
    pub index: usize,
    pub reason: DropReason,
    pub detail: String,
}

/// Chronologically ordered records plus a report of what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedHistory {
    pub records: Vec<OrderRecord>,
    pub dropped: Vec<DroppedRecord>,
}

impl ParsedHistory {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse raw payloads for `user_id`, sorted by `(timestamp, order_id)`.
///
/// The first record for an order id wins; later duplicates are dropped.
pub fn parse_history(user_id: UserId, raw: &[JsonValue]) -> ParsedHistory {
    let mut parsed = ParsedHistory::default();
    let mut seen: HashSet<OrderId> = HashSet::with_capacity(raw.len());

    for (index, value) in raw.iter().enumerate() {
        let record = match serde_json::from_value::<OrderRecord>(value.clone()) {
            Ok(record) => record,
            Err(e) => {
                parsed.dropped.push(DroppedRecord {
                    index,
                    reason: DropReason::Malformed,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        if record.user_id() != user_id {
            parsed.dropped.push(DroppedRecord {
                index,
                reason: DropReason::ForeignUser,
                detail: format!("order {} belongs to user {}", record.order_id(), record.user_id()),
            });
            continue;
        }

        if !seen.insert(record.order_id()) {
            parsed.dropped.push(DroppedRecord {
                index,
                reason: DropReason::DuplicateOrder,
                detail: format!("order {} already seen", record.order_id()),
            });
            continue;
        }

        parsed.records.push(record);
    }

    parsed
        .records
        .sort_by(|a, b| (a.timestamp(), a.order_id()).cmp(&(b.timestamp(), b.order_id())));

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn order_json(user: UserId, order: OrderId, days_ago: i64) -> JsonValue {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        json!({
            "user_id": user,
            "order_id": order,
            "timestamp": base - Duration::days(days_ago),
            "items": [{ "item_id": "milk", "quantity": 1 }],
        })
    }

    #[test]
    fn empty_input_yields_empty_history() {
        let parsed = parse_history(UserId::new(), &[]);
        assert!(parsed.is_empty());
        assert_eq!(parsed.dropped_count(), 0);
    }

    #[test]
    fn records_are_sorted_chronologically() {
        let user = UserId::new();
        let raw = vec![
            order_json(user, OrderId::new(), 0),
            order_json(user, OrderId::new(), 14),
            order_json(user, OrderId::new(), 7),
        ];

        let parsed = parse_history(user, &raw);
        assert_eq!(parsed.records.len(), 3);
        assert!(
            parsed
                .records
                .windows(2)
                .all(|w| w[0].timestamp() <= w[1].timestamp())
        );
    }

    #[test]
    fn unparseable_foreign_and_duplicate_records_are_dropped_and_counted() {
        let user = UserId::new();
        let dup = OrderId::new();
        let raw = vec![
            order_json(user, dup, 3),
            json!({ "garbage": true }),
            order_json(UserId::new(), OrderId::new(), 2),
            order_json(user, dup, 1),
            json!({
                "user_id": user,
                "order_id": OrderId::new(),
                "timestamp": "2024-05-01T00:00:00Z",
                "items": [],
            }),
        ];

        let parsed = parse_history(user, &raw);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.dropped_count(), 4);

        let reasons: Vec<(usize, DropReason)> =
            parsed.dropped.iter().map(|d| (d.index, d.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, DropReason::Malformed),
                (2, DropReason::ForeignUser),
                (3, DropReason::DuplicateOrder),
                (4, DropReason::Malformed),
            ]
        );
    }
}
