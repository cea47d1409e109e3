//! Infrastructure layer: history and session stores, caching, config, and
//! the assistant that wires them to the domain crates.

pub mod assistant;
pub mod config;
pub mod expiry_sweeper;
pub mod history_store;
pub mod renderer;
pub mod session_store;
pub mod stats_cache;


pub use assistant::{AssistantError, ReorderAssistant, SESSION_AGGREGATE_TYPE};
pub use config::{ConfigError, LoadOptions, ReorderConfig};
pub use expiry_sweeper::{ExpirySweeper, ExpirySweeperHandle, SessionExpirer};
pub use history_store::{HistoryError, HistorySnapshot, InMemoryOrderHistoryStore, OrderHistoryStore};
pub use renderer::{InMemoryRenderer, SuggestionRenderer, TracingRenderer};
pub use session_store::{InMemorySessionStore, SessionStore, SessionStoreError};
pub use stats_cache::{CachedStats, DEFAULT_STATS_CACHE_CAPACITY, StatsCache};
