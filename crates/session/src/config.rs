use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{DomainError, DomainResult};

/// Session policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hours a proposed suggestion stays actionable (default 24).
    pub timeout_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_hours: 24 }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.timeout_hours == 0 {
            return Err(DomainError::validation("session timeout must be at least one hour"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::hours(i64::from(self.timeout_hours))
    }

    pub fn expires_at(&self, generated_at: DateTime<Utc>) -> DateTime<Utc> {
        generated_at + self.timeout()
    }
}
