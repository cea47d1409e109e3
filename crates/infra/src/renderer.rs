//! Presentation hook for proposed suggestions.
//!
//! The core never formats text; whatever talks to the user implements
//! [`SuggestionRenderer`].

use std::sync::{Arc, Mutex};

use tracing::info;

use reorder_recommender::Suggestion;

pub trait SuggestionRenderer: Send + Sync {
    fn render_suggestion(&self, suggestion: &Suggestion);
}

impl<R> SuggestionRenderer for Arc<R>
where
    R: SuggestionRenderer + ?Sized,
{
    fn render_suggestion(&self, suggestion: &Suggestion) {
        (**self).render_suggestion(suggestion)
    }
}

/// Emits each proposal as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl SuggestionRenderer for TracingRenderer {
    fn render_suggestion(&self, suggestion: &Suggestion) {
        info!(
            user = %suggestion.user_id(),
            suggestion = %suggestion.suggestion_id(),
            candidates = suggestion.candidates().len(),
            total_units = suggestion.total_units(),
            "suggestion ready for review"
        );
    }
}

/// In-memory renderer for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRenderer {
    rendered: Mutex<Vec<Suggestion>>,
}

impl InMemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> Vec<Suggestion> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SuggestionRenderer for InMemoryRenderer {
    fn render_suggestion(&self, suggestion: &Suggestion) {
        if let Ok(mut rendered) = self.rendered.lock() {
            rendered.push(suggestion.clone());
        }
    }
}
