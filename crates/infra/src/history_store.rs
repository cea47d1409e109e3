//! Order history access.
//!
//! The history store is owned by another subsystem; the core only reads a
//! per-user snapshot. Records are kept as raw JSON payloads so that a bad
//! write upstream degrades one record, not the whole history.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;

use reorder_core::UserId;
use reorder_orders::OrderRecord;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("order history unavailable: {0}")]
    Unavailable(String),

    #[error("order record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A consistent view of one user's history at a given revision.
///
/// `revision` increases by one per appended record; equal revisions mean
/// equal records.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub user_id: UserId,
    pub revision: u64,
    pub records: Vec<JsonValue>,
}

impl HistorySnapshot {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            revision: 0,
            records: Vec::new(),
        }
    }
}

/// Read side of the order history collaborator.
pub trait OrderHistoryStore: Send + Sync {
    fn get_order_history(&self, user_id: UserId) -> Result<HistorySnapshot, HistoryError>;
}

impl<S> OrderHistoryStore for Arc<S>
where
    S: OrderHistoryStore + ?Sized,
{
    fn get_order_history(&self, user_id: UserId) -> Result<HistorySnapshot, HistoryError> {
        (**self).get_order_history(user_id)
    }
}

#[derive(Debug, Default)]
struct UserHistory {
    revision: u64,
    records: Vec<JsonValue>,
}

/// In-memory history store for tests/dev.
///
/// Appends are whole-record and happen under the write lock, so readers
/// never see a partially written order.
#[derive(Debug, Default)]
pub struct InMemoryOrderHistoryStore {
    users: RwLock<HashMap<UserId, UserHistory>>,
}

impl InMemoryOrderHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated record under its own user. Returns the new revision.
    pub fn append_order(&self, record: &OrderRecord) -> Result<u64, HistoryError> {
        let payload = serde_json::to_value(record)?;
        self.append_raw(record.user_id(), payload)
    }

    /// Append an arbitrary payload to `user_id`'s history, valid or not.
    pub fn append_raw(&self, user_id: UserId, payload: JsonValue) -> Result<u64, HistoryError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| HistoryError::Unavailable("lock poisoned".to_string()))?;

        let history = users.entry(user_id).or_default();
        history.records.push(payload);
        history.revision += 1;
        Ok(history.revision)
    }

    pub fn revision(&self, user_id: UserId) -> Result<u64, HistoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| HistoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(users.get(&user_id).map(|h| h.revision).unwrap_or(0))
    }
}

impl OrderHistoryStore for InMemoryOrderHistoryStore {
    fn get_order_history(&self, user_id: UserId) -> Result<HistorySnapshot, HistoryError> {
        let users = self
            .users
            .read()
            .map_err(|_| HistoryError::Unavailable("lock poisoned".to_string()))?;

        Ok(match users.get(&user_id) {
            Some(history) => HistorySnapshot {
                user_id,
                revision: history.revision,
                records: history.records.clone(),
            },
            None => HistorySnapshot::empty(user_id),
        })
    }
}
