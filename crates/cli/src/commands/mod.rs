pub mod config;
pub mod stats;
pub mod suggest;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;

use reorder_core::UserId;
use reorder_events::{EventEnvelope, InMemoryEventBus};
use reorder_infra::{
    InMemoryOrderHistoryStore, InMemorySessionStore, LoadOptions, ReorderAssistant, ReorderConfig,
    TracingRenderer,
};
use reorder_session::ReorderAuthorized;

pub type CliAssistant = ReorderAssistant<
    Arc<InMemoryOrderHistoryStore>,
    InMemorySessionStore,
    InMemoryEventBus<EventEnvelope<ReorderAuthorized>>,
    TracingRenderer,
>;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ReorderConfig> {
    let options = LoadOptions {
        config_path: path.map(Path::to_path_buf),
        require_file: path.is_some(),
    };
    ReorderConfig::load(options).context("loading configuration")
}

/// Read a JSON array of raw order records.
pub fn read_history(path: &Path) -> anyhow::Result<Vec<JsonValue>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading history file `{}`", path.display()))?;
    let records: Vec<JsonValue> = serde_json::from_str(&raw)
        .with_context(|| format!("history file `{}` is not a JSON array", path.display()))?;
    Ok(records)
}

/// Build an assistant whose history holds `records` under `user_id`.
///
/// Every record is filed under the requested user; the parser later drops
/// the ones that belong to somebody else.
pub fn assistant_for(
    config: &ReorderConfig,
    user_id: UserId,
    records: Vec<JsonValue>,
) -> anyhow::Result<CliAssistant> {
    let history = Arc::new(InMemoryOrderHistoryStore::new());
    for record in records {
        history.append_raw(user_id, record)?;
    }

    let assistant = ReorderAssistant::new(
        history,
        InMemorySessionStore::new(),
        InMemoryEventBus::new(),
        TracingRenderer,
        config,
    )?;
    Ok(assistant)
}
