use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{DomainError, DomainResult, ItemId, OrderId, UserId};

/// One line of a historical order: item and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(item_id: ItemId, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self { item_id, quantity })
    }
}

/// A past order, immutable once created.
///
/// Always holds at least one line and only positive quantities; the
/// deserializer runs the same checks as [`OrderRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderRecord")]
pub struct OrderRecord {
    user_id: UserId,
    order_id: OrderId,
    timestamp: DateTime<Utc>,
    items: Vec<OrderLine>,
}

#[derive(Deserialize)]
struct RawOrderRecord {
    user_id: UserId,
    order_id: OrderId,
    timestamp: DateTime<Utc>,
    items: Vec<OrderLine>,
}

impl TryFrom<RawOrderRecord> for OrderRecord {
    type Error = DomainError;

    fn try_from(raw: RawOrderRecord) -> Result<Self, Self::Error> {
        OrderRecord::new(raw.user_id, raw.order_id, raw.timestamp, raw.items)
    }
}

impl OrderRecord {
    pub fn new(
        user_id: UserId,
        order_id: OrderId,
        timestamp: DateTime<Utc>,
        items: Vec<OrderLine>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        if let Some(line) = items.iter().find(|l| l.quantity == 0) {
            return Err(DomainError::validation(format!(
                "quantity for item {} must be positive",
                line.item_id
            )));
        }

        Ok(Self {
            user_id,
            order_id,
            timestamp,
            items,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn items(&self) -> &[OrderLine] {
        &self.items
    }

    /// Per-item quantities for this order, lines of the same item summed.
    ///
    /// Items keep the order of their first appearance.
    pub fn item_quantities(&self) -> Vec<(&ItemId, u32)> {
        let mut out: Vec<(&ItemId, u32)> = Vec::with_capacity(self.items.len());
        for line in &self.items {
            match out.iter_mut().find(|(id, _)| *id == &line.item_id) {
                Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
                None => out.push((&line.item_id, line.quantity)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str) -> ItemId {
        id.parse().unwrap()
    }

    #[test]
    fn new_rejects_empty_orders() {
        let err = OrderRecord::new(UserId::new(), OrderId::new(), Utc::now(), vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn order_line_rejects_zero_quantity() {
        assert!(OrderLine::new(item("milk"), 0).is_err());
        assert_eq!(OrderLine::new(item("milk"), 2).unwrap().quantity, 2);
    }

    #[test]
    fn item_quantities_sum_repeated_lines() {
        let record = OrderRecord::new(
            UserId::new(),
            OrderId::new(),
            Utc::now(),
            vec![
                OrderLine::new(item("milk"), 1).unwrap(),
                OrderLine::new(item("bread"), 2).unwrap(),
                OrderLine::new(item("milk"), 3).unwrap(),
            ],
        )
        .unwrap();

        let quantities = record.item_quantities();
        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities[0], (&item("milk"), 4));
        assert_eq!(quantities[1], (&item("bread"), 2));
    }

    #[test]
    fn deserialization_applies_validation() {
        let user = UserId::new();
        let good = json!({
            "user_id": user,
            "order_id": OrderId::new(),
            "timestamp": "2024-03-01T10:00:00Z",
            "items": [{ "item_id": "eggs", "quantity": 12 }],
        });
        let record: OrderRecord = serde_json::from_value(good).unwrap();
        assert_eq!(record.user_id(), user);
        assert_eq!(record.items()[0].quantity, 12);

        let zero_qty = json!({
            "user_id": user,
            "order_id": OrderId::new(),
            "timestamp": "2024-03-01T10:00:00Z",
            "items": [{ "item_id": "eggs", "quantity": 0 }],
        });
        assert!(serde_json::from_value::<OrderRecord>(zero_qty).is_err());
    }
}
