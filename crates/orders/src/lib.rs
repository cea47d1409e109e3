//! Order history domain module.
//!
//! Immutable order records as the core sees them, plus the lenient parser
//! that turns raw stored payloads into records (dropping what it cannot read).

pub mod history;
pub mod record;

pub use history::{DropReason, DroppedRecord, ParsedHistory, parse_history};
pub use record::{OrderLine, OrderRecord};
