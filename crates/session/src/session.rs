use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reorder_core::{Aggregate, AggregateRoot, DomainError, SuggestionId, UserId};
use reorder_events::Event;
use reorder_orders::OrderLine;
use reorder_recommender::Suggestion;

/// Session status lifecycle.
///
/// `Proposed` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Proposed,
    Confirmed,
    Edited,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Proposed => "proposed",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Edited => "edited",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Proposed)
    }
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user resolved a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOutcome {
    Confirmed,
    Edited,
    Cancelled,
}

/// Terminal, write-once record of the user's decision.
///
/// `final_items` is present iff the outcome is confirmed or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionDecision {
    pub suggestion_id: SuggestionId,
    pub outcome: DecisionOutcome,
    pub final_items: Option<Vec<OrderLine>>,
    pub decided_at: DateTime<Utc>,
}

/// Aggregate root: SuggestionSession.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionSession {
    id: SuggestionId,
    user_id: Option<UserId>,
    suggestion: Option<Suggestion>,
    status: SessionStatus,
    expires_at: Option<DateTime<Utc>>,
    final_items: Option<Vec<OrderLine>>,
    resolved_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl SuggestionSession {
    /// Create an empty, not-yet-proposed aggregate instance for rehydration.
    pub fn empty(id: SuggestionId) -> Self {
        Self {
            id,
            user_id: None,
            suggestion: None,
            status: SessionStatus::Proposed,
            expires_at: None,
            final_items: None,
            resolved_at: None,
            version: 0,
            created: false,
        }
    }

    /// Rebuild a session from its event history.
    pub fn from_events<'a>(
        id: SuggestionId,
        events: impl IntoIterator<Item = &'a SessionEvent>,
    ) -> Self {
        let mut session = Self::empty(id);
        for event in events {
            session.apply(event);
        }
        session
    }

    pub fn id_typed(&self) -> SuggestionId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.suggestion.as_ref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Status as last recorded by an event.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Status as it must be read at `now`: a timed-out proposal reads as expired.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        match (self.status, self.expires_at) {
            (SessionStatus::Proposed, Some(deadline)) if now >= deadline => SessionStatus::Expired,
            (status, _) => status,
        }
    }

    /// True while the session is proposed and still inside its timeout.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.created && self.status_at(now) == SessionStatus::Proposed
    }

    /// A proposed session whose deadline has passed but which has not been expired yet.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.created
            && self.status == SessionStatus::Proposed
            && self.status_at(now) == SessionStatus::Expired
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn final_items(&self) -> Option<&[OrderLine]> {
        self.final_items.as_deref()
    }

    /// Items the user authorized for ordering (confirmed or edited sessions only).
    pub fn authorized_items(&self) -> Option<&[OrderLine]> {
        match self.status {
            SessionStatus::Confirmed | SessionStatus::Edited => self.final_items(),
            _ => None,
        }
    }

    /// The user's decision, once there is one. Expired sessions have none.
    pub fn decision(&self) -> Option<SuggestionDecision> {
        let outcome = match self.status {
            SessionStatus::Confirmed => DecisionOutcome::Confirmed,
            SessionStatus::Edited => DecisionOutcome::Edited,
            SessionStatus::Cancelled => DecisionOutcome::Cancelled,
            SessionStatus::Proposed | SessionStatus::Expired => return None,
        };
        Some(SuggestionDecision {
            suggestion_id: self.id,
            outcome,
            final_items: self.final_items.clone(),
            decided_at: self.resolved_at?,
        })
    }
}

impl AggregateRoot for SuggestionSession {
    type Id = SuggestionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ProposeSuggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposeSuggestion {
    pub suggestion: Suggestion,
    pub expires_at: DateTime<Utc>,
}

/// Command: ConfirmSuggestion (accept as-is).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmSuggestion {
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditSuggestion (accept with modified items/quantities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSuggestion {
    pub suggestion_id: SuggestionId,
    pub final_items: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSuggestion (decline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSuggestion {
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExpireSuggestion (timeout reached without a decision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireSuggestion {
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    ProposeSuggestion(ProposeSuggestion),
    ConfirmSuggestion(ConfirmSuggestion),
    EditSuggestion(EditSuggestion),
    CancelSuggestion(CancelSuggestion),
    ExpireSuggestion(ExpireSuggestion),
}

/// Event: SuggestionProposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionProposed {
    pub suggestion: Suggestion,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionConfirmed {
    pub user_id: UserId,
    pub suggestion_id: SuggestionId,
    pub final_items: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionEdited {
    pub user_id: UserId,
    pub suggestion_id: SuggestionId,
    pub final_items: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionCancelled {
    pub user_id: UserId,
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SuggestionExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionExpired {
    pub user_id: UserId,
    pub suggestion_id: SuggestionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    SuggestionProposed(SuggestionProposed),
    SuggestionConfirmed(SuggestionConfirmed),
    SuggestionEdited(SuggestionEdited),
    SuggestionCancelled(SuggestionCancelled),
    SuggestionExpired(SuggestionExpired),
}

impl SessionEvent {
    /// The order authorization this event grants, if any.
    ///
    /// Only confirmed and edited sessions authorize a reorder.
    pub fn reorder_authorized(&self) -> Option<ReorderAuthorized> {
        match self {
            SessionEvent::SuggestionConfirmed(e) => Some(ReorderAuthorized {
                user_id: e.user_id,
                suggestion_id: e.suggestion_id,
                outcome: DecisionOutcome::Confirmed,
                final_items: e.final_items.clone(),
                authorized_at: e.occurred_at,
            }),
            SessionEvent::SuggestionEdited(e) => Some(ReorderAuthorized {
                user_id: e.user_id,
                suggestion_id: e.suggestion_id,
                outcome: DecisionOutcome::Edited,
                final_items: e.final_items.clone(),
                authorized_at: e.occurred_at,
            }),
            SessionEvent::SuggestionProposed(_)
            | SessionEvent::SuggestionCancelled(_)
            | SessionEvent::SuggestionExpired(_) => None,
        }
    }
}

impl Event for SessionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SuggestionProposed(_) => "reorder.session.proposed",
            SessionEvent::SuggestionConfirmed(_) => "reorder.session.confirmed",
            SessionEvent::SuggestionEdited(_) => "reorder.session.edited",
            SessionEvent::SuggestionCancelled(_) => "reorder.session.cancelled",
            SessionEvent::SuggestionExpired(_) => "reorder.session.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::SuggestionProposed(e) => e.occurred_at,
            SessionEvent::SuggestionConfirmed(e) => e.occurred_at,
            SessionEvent::SuggestionEdited(e) => e.occurred_at,
            SessionEvent::SuggestionCancelled(e) => e.occurred_at,
            SessionEvent::SuggestionExpired(e) => e.occurred_at,
        }
    }
}

/// Integration event for the order-placement collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderAuthorized {
    pub user_id: UserId,
    pub suggestion_id: SuggestionId,
    pub outcome: DecisionOutcome,
    pub final_items: Vec<OrderLine>,
    pub authorized_at: DateTime<Utc>,
}

impl Event for ReorderAuthorized {
    fn event_type(&self) -> &'static str {
        "reorder.authorized"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.authorized_at
    }
}

impl Aggregate for SuggestionSession {
    type Command = SessionCommand;
    type Event = SessionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SessionEvent::SuggestionProposed(e) => {
                self.id = e.suggestion.suggestion_id();
                self.user_id = Some(e.suggestion.user_id());
                self.suggestion = Some(e.suggestion.clone());
                self.status = SessionStatus::Proposed;
                self.expires_at = Some(e.expires_at);
                self.final_items = None;
                self.resolved_at = None;
                self.created = true;
            }
            SessionEvent::SuggestionConfirmed(e) => {
                self.status = SessionStatus::Confirmed;
                self.final_items = Some(e.final_items.clone());
                self.resolved_at = Some(e.occurred_at);
            }
            SessionEvent::SuggestionEdited(e) => {
                self.status = SessionStatus::Edited;
                self.final_items = Some(e.final_items.clone());
                self.resolved_at = Some(e.occurred_at);
            }
            SessionEvent::SuggestionCancelled(e) => {
                self.status = SessionStatus::Cancelled;
                self.resolved_at = Some(e.occurred_at);
            }
            SessionEvent::SuggestionExpired(e) => {
                self.status = SessionStatus::Expired;
                self.resolved_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SessionCommand::ProposeSuggestion(cmd) => self.handle_propose(cmd),
            SessionCommand::ConfirmSuggestion(cmd) => self.handle_confirm(cmd),
            SessionCommand::EditSuggestion(cmd) => self.handle_edit(cmd),
            SessionCommand::CancelSuggestion(cmd) => self.handle_cancel(cmd),
            SessionCommand::ExpireSuggestion(cmd) => self.handle_expire(cmd),
        }
    }
}

impl SuggestionSession {
    fn ensure_suggestion_id(&self, suggestion_id: SuggestionId) -> Result<(), DomainError> {
        if self.id != suggestion_id {
            return Err(DomainError::invariant("suggestion_id mismatch"));
        }
        Ok(())
    }

    fn proposed_user(&self) -> Result<UserId, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.user_id
            .ok_or_else(|| DomainError::invariant("proposed session has no user"))
    }

    /// A decision is allowed only on a proposed session still inside its timeout.
    fn ensure_decidable(&self, now: DateTime<Utc>, attempted: &str) -> Result<(), DomainError> {
        match self.status_at(now) {
            SessionStatus::Proposed => Ok(()),
            SessionStatus::Expired => Err(DomainError::stale(format!(
                "suggestion {} expired at {}",
                self.id,
                self.expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string())
            ))),
            terminal => Err(DomainError::invalid_transition(terminal.as_str(), attempted)),
        }
    }

    fn handle_propose(&self, cmd: &ProposeSuggestion) -> Result<Vec<SessionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("suggestion session already exists"));
        }
        self.ensure_suggestion_id(cmd.suggestion.suggestion_id())?;

        if cmd.suggestion.candidates().is_empty() {
            return Err(DomainError::validation(
                "cannot propose a suggestion without candidates",
            ));
        }

        if cmd.expires_at <= cmd.suggestion.generated_at() {
            return Err(DomainError::validation(
                "expiry must be after the suggestion was generated",
            ));
        }

        Ok(vec![SessionEvent::SuggestionProposed(SuggestionProposed {
            suggestion: cmd.suggestion.clone(),
            expires_at: cmd.expires_at,
            occurred_at: cmd.suggestion.generated_at(),
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmSuggestion) -> Result<Vec<SessionEvent>, DomainError> {
        let user_id = self.proposed_user()?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;
        self.ensure_decidable(cmd.occurred_at, "confirm")?;

        let final_items = self
            .suggestion
            .as_ref()
            .map(Suggestion::order_lines)
            .ok_or_else(|| DomainError::invariant("proposed session has no suggestion"))?;

        Ok(vec![SessionEvent::SuggestionConfirmed(SuggestionConfirmed {
            user_id,
            suggestion_id: cmd.suggestion_id,
            final_items,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditSuggestion) -> Result<Vec<SessionEvent>, DomainError> {
        let user_id = self.proposed_user()?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;
        self.ensure_decidable(cmd.occurred_at, "edit")?;

        if cmd.final_items.is_empty() {
            return Err(DomainError::validation(
                "edited suggestion must keep at least one item (cancel instead)",
            ));
        }

        let mut seen = HashSet::with_capacity(cmd.final_items.len());
        for line in &cmd.final_items {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity for item {} must be positive",
                    line.item_id
                )));
            }
            if !seen.insert(&line.item_id) {
                return Err(DomainError::validation(format!(
                    "item {} listed more than once",
                    line.item_id
                )));
            }
        }

        Ok(vec![SessionEvent::SuggestionEdited(SuggestionEdited {
            user_id,
            suggestion_id: cmd.suggestion_id,
            final_items: cmd.final_items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSuggestion) -> Result<Vec<SessionEvent>, DomainError> {
        let user_id = self.proposed_user()?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;
        self.ensure_decidable(cmd.occurred_at, "cancel")?;

        Ok(vec![SessionEvent::SuggestionCancelled(SuggestionCancelled {
            user_id,
            suggestion_id: cmd.suggestion_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire(&self, cmd: &ExpireSuggestion) -> Result<Vec<SessionEvent>, DomainError> {
        let user_id = self.proposed_user()?;
        self.ensure_suggestion_id(cmd.suggestion_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(self.status.as_str(), "expire"));
        }

        if !self.is_due_for_expiry(cmd.occurred_at) {
            return Err(DomainError::validation(
                "cannot expire a suggestion before its timeout",
            ));
        }

        Ok(vec![SessionEvent::SuggestionExpired(SuggestionExpired {
            user_id,
            suggestion_id: cmd.suggestion_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
