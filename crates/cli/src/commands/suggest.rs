use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use reorder_core::UserId;
use reorder_infra::ReorderConfig;
use reorder_recommender::RankOutcome;

use crate::HistoryArgs;
use crate::commands::{assistant_for, read_history};

#[derive(Debug, Serialize)]
pub struct SuggestReport {
    pub user_id: UserId,
    pub evaluated_at: DateTime<Utc>,
    pub history_revision: u64,
    pub dropped_records: usize,
    /// Deadline of the opened session, when a suggestion was made.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub outcome: RankOutcome,
}

pub fn run(config: &ReorderConfig, args: &HistoryArgs) -> anyhow::Result<String> {
    let records = read_history(&args.history)?;
    let report = report(config, args.user, args.now.unwrap_or_else(Utc::now), records)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn report(
    config: &ReorderConfig,
    user_id: UserId,
    now: DateTime<Utc>,
    records: Vec<JsonValue>,
) -> anyhow::Result<SuggestReport> {
    let assistant = assistant_for(config, user_id, records)?;
    let outcome = assistant.suggest(user_id, now)?;
    let cached = assistant.item_stats(user_id)?;

    let expires_at = outcome
        .suggestion()
        .map(|s| assistant.session_config().expires_at(s.generated_at()));

    Ok(SuggestReport {
        user_id,
        evaluated_at: now,
        history_revision: cached.revision,
        dropped_records: cached.dropped_records,
        expires_at,
        outcome,
    })
}
