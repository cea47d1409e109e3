use chrono::{DateTime, Utc};
use serde::Serialize;

use reorder_core::UserId;
use reorder_infra::ReorderConfig;
use reorder_recommender::ItemStat;

use crate::HistoryArgs;
use crate::commands::{assistant_for, read_history};

#[derive(Debug, Serialize)]
struct StatsRow<'a> {
    #[serde(flatten)]
    stat: &'a ItemStat,
    days_since_last_purchase: f64,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct StatsReport<'a> {
    user_id: UserId,
    evaluated_at: DateTime<Utc>,
    history_revision: u64,
    dropped_records: usize,
    items: Vec<StatsRow<'a>>,
}

pub fn run(config: &ReorderConfig, args: &HistoryArgs) -> anyhow::Result<String> {
    let records = read_history(&args.history)?;
    let now = args.now.unwrap_or_else(Utc::now);

    let assistant = assistant_for(config, args.user, records)?;
    let cached = assistant.item_stats(args.user)?;

    let items = cached
        .stats
        .iter()
        .map(|stat| StatsRow {
            stat,
            days_since_last_purchase: stat.days_since_last_purchase(now),
            confidence: assistant.ranker().confidence(stat, now),
        })
        .collect();

    let report = StatsReport {
        user_id: args.user,
        evaluated_at: now,
        history_revision: cached.revision,
        dropped_records: cached.dropped_records,
        items,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
