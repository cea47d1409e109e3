//! Suggestion session domain module (event-sourced).
//!
//! A session holds one proposed suggestion until the user confirms, edits or
//! cancels it, or until it times out. Only confirmed and edited sessions
//! authorize a reorder; nothing here ever places one.

pub mod config;
pub mod session;

pub use config::SessionConfig;
pub use session::{
    CancelSuggestion, ConfirmSuggestion, DecisionOutcome, EditSuggestion, ExpireSuggestion,
    ProposeSuggestion, ReorderAuthorized, SessionCommand, SessionEvent, SessionStatus,
    SuggestionCancelled, SuggestionConfirmed, SuggestionDecision, SuggestionEdited,
    SuggestionExpired, SuggestionProposed, SuggestionSession,
};
