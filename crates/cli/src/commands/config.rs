use reorder_infra::ReorderConfig;

/// Effective configuration (precedence: env > file > default).
pub fn run(config: &ReorderConfig) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
