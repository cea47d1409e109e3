//! Reorder assistant: application orchestration.
//!
//! The only component that talks to collaborators. Everything it calls in
//! the domain crates is pure; here we load, decide, persist, then publish.
//!
//! ```text
//! suggest:  history snapshot -> stats (cached per revision) -> rank
//!           -> ProposeSuggestion -> session store -> renderer
//! decide:   session store -> rehydrate -> Confirm/Edit/Cancel
//!           -> session store -> bus (ReorderAuthorized, confirm/edit only)
//! ```
//!
//! Events are persisted before anything is published. A publish failure is
//! reported to the caller with the decision already recorded; the caller
//! retries with `republish_authorization`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use reorder_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, SuggestionId, UserId};
use reorder_events::{EventBus, EventEnvelope};
use reorder_orders::{OrderLine, parse_history};
use reorder_recommender::{PatternExtractor, RankOutcome, SuggestionRanker};
use reorder_session::{
    CancelSuggestion, ConfirmSuggestion, EditSuggestion, ExpireSuggestion, ProposeSuggestion,
    ReorderAuthorized, SessionCommand, SessionConfig, SessionStatus, SuggestionDecision,
    SuggestionSession,
};

use crate::config::{ConfigError, ReorderConfig};
use crate::history_store::{HistoryError, OrderHistoryStore};
use crate::renderer::SuggestionRenderer;
use crate::session_store::{SessionStore, SessionStoreError};
use crate::stats_cache::{CachedStats, StatsCache};

/// Aggregate type recorded on published envelopes.
pub const SESSION_AGGREGATE_TYPE: &str = "reorder.suggestion_session";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Sessions(SessionStoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The decision is stored; only the authorization failed to go out.
    #[error("reorder authorization recorded but not published: {0}")]
    Publish(String),
}

impl AssistantError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            AssistantError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SessionStoreError> for AssistantError {
    fn from(value: SessionStoreError) -> Self {
        match value {
            SessionStoreError::OpenSessionExists {
                user_id,
                suggestion_id,
            } => AssistantError::Domain(DomainError::session_conflict(format!(
                "user {user_id} already has active suggestion {suggestion_id}"
            ))),
            SessionStoreError::Concurrency(msg) => AssistantError::Domain(DomainError::conflict(msg)),
            other => AssistantError::Sessions(other),
        }
    }
}

pub struct ReorderAssistant<H, S, B, R> {
    history: H,
    sessions: S,
    bus: B,
    renderer: R,
    extractor: PatternExtractor,
    ranker: SuggestionRanker,
    session_config: SessionConfig,
    cache: StatsCache,
}

impl<H, S, B, R> ReorderAssistant<H, S, B, R> {
    pub fn new(
        history: H,
        sessions: S,
        bus: B,
        renderer: R,
        config: &ReorderConfig,
    ) -> Result<Self, AssistantError> {
        config.validate()?;
        let ranker = SuggestionRanker::new(config.ranker.clone()).map_err(ConfigError::from)?;

        Ok(Self {
            history,
            sessions,
            bus,
            renderer,
            extractor: PatternExtractor::new(),
            ranker,
            session_config: config.session.clone(),
            cache: StatsCache::new(),
        })
    }

    pub fn ranker(&self) -> &SuggestionRanker {
        &self.ranker
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn stats_cache(&self) -> &StatsCache {
        &self.cache
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<H, S, B, R> ReorderAssistant<H, S, B, R>
where
    H: OrderHistoryStore,
    S: SessionStore,
    B: EventBus<EventEnvelope<ReorderAuthorized>>,
    R: SuggestionRenderer,
{
    /// Item statistics for the user's current history revision.
    pub fn item_stats(&self, user_id: UserId) -> Result<Arc<CachedStats>, AssistantError> {
        let snapshot = self.history.get_order_history(user_id)?;
        let revision = snapshot.revision;

        Ok(self.cache.get_or_compute(user_id, revision, || {
            let parsed = parse_history(user_id, &snapshot.records);
            for dropped in &parsed.dropped {
                warn!(
                    user = %user_id,
                    index = dropped.index,
                    reason = ?dropped.reason,
                    detail = %dropped.detail,
                    "dropping unusable order record"
                );
            }

            let stats = self.extractor.extract(user_id, &parsed.records);
            debug!(user = %user_id, revision, items = stats.len(), "item statistics computed");

            CachedStats {
                revision,
                stats,
                dropped_records: parsed.dropped_count(),
            }
        }))
    }

    /// Rank the user's history and, if anything qualifies, open a session for it.
    ///
    /// Fails with `SessionConflict` while another session is still awaiting a decision.
    pub fn suggest(&self, user_id: UserId, now: DateTime<Utc>) -> Result<RankOutcome, AssistantError> {
        self.ensure_no_active_session(user_id, now)?;

        let cached = self.item_stats(user_id)?;
        let outcome = self.ranker.rank(&cached.stats, now);

        let suggestion = match &outcome {
            RankOutcome::Suggested { suggestion, .. } => suggestion.clone(),
            RankOutcome::NoSuggestion { reason, summary } => {
                info!(
                    user = %user_id,
                    reason = ?reason,
                    items_analyzed = summary.items_analyzed,
                    below_threshold = summary.below_threshold,
                    "no suggestion"
                );
                return Ok(outcome);
            }
        };

        let suggestion_id = suggestion.suggestion_id();
        let expires_at = self.session_config.expires_at(suggestion.generated_at());
        let mut session = SuggestionSession::empty(suggestion_id);
        let events = session.execute(&SessionCommand::ProposeSuggestion(ProposeSuggestion {
            suggestion,
            expires_at,
        }))?;
        self.sessions
            .append(user_id, suggestion_id, &events, ExpectedVersion::Exact(0))?;

        info!(
            user = %user_id,
            suggestion = %suggestion_id,
            candidates = outcome.suggestion().map(|s| s.candidates().len()).unwrap_or(0),
            expires_at = %expires_at,
            "suggestion proposed"
        );

        if let Some(suggestion) = session.suggestion() {
            self.renderer.render_suggestion(suggestion);
        }

        Ok(outcome)
    }

    /// Accept the suggestion as proposed.
    pub fn confirm(
        &self,
        suggestion_id: SuggestionId,
        now: DateTime<Utc>,
    ) -> Result<SuggestionDecision, AssistantError> {
        self.decide(
            suggestion_id,
            now,
            SessionCommand::ConfirmSuggestion(ConfirmSuggestion {
                suggestion_id,
                occurred_at: now,
            }),
        )
    }

    /// Accept with modified items or quantities.
    pub fn edit(
        &self,
        suggestion_id: SuggestionId,
        final_items: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> Result<SuggestionDecision, AssistantError> {
        self.decide(
            suggestion_id,
            now,
            SessionCommand::EditSuggestion(EditSuggestion {
                suggestion_id,
                final_items,
                occurred_at: now,
            }),
        )
    }

    /// Decline the suggestion. Nothing is authorized.
    pub fn cancel(
        &self,
        suggestion_id: SuggestionId,
        now: DateTime<Utc>,
    ) -> Result<SuggestionDecision, AssistantError> {
        self.decide(
            suggestion_id,
            now,
            SessionCommand::CancelSuggestion(CancelSuggestion {
                suggestion_id,
                occurred_at: now,
            }),
        )
    }

    pub fn session(&self, suggestion_id: SuggestionId) -> Result<SuggestionSession, AssistantError> {
        self.sessions
            .load(suggestion_id)?
            .ok_or_else(|| AssistantError::Domain(DomainError::not_found()))
    }

    /// Status as observed at `now` (timed-out proposals read as expired).
    pub fn session_status(
        &self,
        suggestion_id: SuggestionId,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, AssistantError> {
        Ok(self.session(suggestion_id)?.status_at(now))
    }

    /// The user's session still awaiting a decision at `now`, if any.
    pub fn active_session(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<SuggestionSession>, AssistantError> {
        let Some(open_id) = self.sessions.open_session(user_id)? else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .load(open_id)?
            .filter(|session| session.is_active_at(now)))
    }

    /// Publish the stored authorization of a confirmed or edited session again.
    ///
    /// Recovery path after [`AssistantError::Publish`]: the decision is already
    /// recorded, so nothing is appended. Subscribers may see the authorization
    /// twice and must dedupe on `suggestion_id`.
    pub fn republish_authorization(&self, suggestion_id: SuggestionId) -> Result<(), AssistantError> {
        let events = self.sessions.load_stream(suggestion_id)?;
        if events.is_empty() {
            return Err(AssistantError::Domain(DomainError::not_found()));
        }
        let session = SuggestionSession::from_events(suggestion_id, &events);

        let authorized = events
            .iter()
            .rev()
            .find_map(|e| e.reorder_authorized())
            .ok_or_else(|| {
                AssistantError::Domain(DomainError::invalid_transition(
                    session.status().as_str(),
                    "republish the authorization of",
                ))
            })?;

        debug!(suggestion = %suggestion_id, "republishing reorder authorization");
        self.publish_authorization(&session, authorized)
    }

    /// Record expiry for every open session past its deadline. Returns how many.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, AssistantError> {
        let mut expired = 0;
        for suggestion_id in self.sessions.open_sessions()? {
            let Some(session) = self.sessions.load(suggestion_id)? else {
                continue;
            };
            if session.is_due_for_expiry(now) && self.expire_session(&session, now)? {
                expired += 1;
            }
        }

        if expired > 0 {
            info!(expired, "expired stale suggestions");
        }
        Ok(expired)
    }

    fn ensure_no_active_session(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(), AssistantError> {
        let Some(open_id) = self.sessions.open_session(user_id)? else {
            return Ok(());
        };
        let Some(session) = self.sessions.load(open_id)? else {
            return Ok(());
        };

        if session.is_active_at(now) {
            return Err(AssistantError::Domain(DomainError::session_conflict(format!(
                "user {user_id} already has active suggestion {open_id}"
            ))));
        }

        if session.is_due_for_expiry(now) {
            self.expire_session(&session, now)?;
        }
        Ok(())
    }

    /// Returns `false` if another caller resolved the session first.
    fn expire_session(&self, session: &SuggestionSession, now: DateTime<Utc>) -> Result<bool, AssistantError> {
        let user_id = owner(session)?;
        let suggestion_id = session.id_typed();
        let expected = ExpectedVersion::Exact(session.version());

        let mut session = session.clone();
        let events = session.execute(&SessionCommand::ExpireSuggestion(ExpireSuggestion {
            suggestion_id,
            occurred_at: now,
        }))?;

        match self.sessions.append(user_id, suggestion_id, &events, expected) {
            Ok(_) => {
                info!(user = %user_id, suggestion = %suggestion_id, "suggestion expired");
                Ok(true)
            }
            Err(SessionStoreError::Concurrency(msg)) => {
                debug!(suggestion = %suggestion_id, %msg, "session resolved concurrently; skipping expiry");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn decide(
        &self,
        suggestion_id: SuggestionId,
        now: DateTime<Utc>,
        command: SessionCommand,
    ) -> Result<SuggestionDecision, AssistantError> {
        let mut session = self.session(suggestion_id)?;
        let user_id = owner(&session)?;
        let expected = ExpectedVersion::Exact(session.version());

        let events = match session.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                if matches!(err, DomainError::StaleSuggestion(_)) && session.is_due_for_expiry(now) {
                    self.expire_session(&session, now)?;
                }
                warn!(user = %user_id, suggestion = %suggestion_id, error = %err, "decision rejected");
                return Err(err.into());
            }
        };

        for event in &events {
            session.apply(event);
        }
        self.sessions.append(user_id, suggestion_id, &events, expected)?;

        for authorized in events.iter().filter_map(|e| e.reorder_authorized()) {
            self.publish_authorization(&session, authorized)?;
        }

        let decision = session.decision().ok_or_else(|| {
            AssistantError::Domain(DomainError::invariant("resolved session has no decision"))
        })?;
        info!(
            user = %user_id,
            suggestion = %suggestion_id,
            outcome = ?decision.outcome,
            "suggestion decided"
        );
        Ok(decision)
    }

    fn publish_authorization(
        &self,
        session: &SuggestionSession,
        authorized: ReorderAuthorized,
    ) -> Result<(), AssistantError> {
        let user_id = authorized.user_id;
        let suggestion_id = authorized.suggestion_id;
        let lines = authorized.final_items.len();

        let envelope = EventEnvelope::wrap(
            user_id,
            suggestion_id.aggregate_id(),
            SESSION_AGGREGATE_TYPE,
            session.version(),
            authorized,
        );
        self.bus.publish(envelope).map_err(|e| {
            warn!(user = %user_id, suggestion = %suggestion_id, error = ?e, "failed to publish reorder authorization");
            AssistantError::Publish(format!("{e:?}"))
        })?;

        info!(user = %user_id, suggestion = %suggestion_id, lines, "reorder authorized");
        Ok(())
    }
}

fn owner(session: &SuggestionSession) -> Result<UserId, AssistantError> {
    session
        .user_id()
        .ok_or_else(|| AssistantError::Domain(DomainError::invariant("stored session has no user")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use reorder_core::{ItemId, OrderId};
    use reorder_events::InMemoryEventBus;
    use reorder_orders::OrderRecord;
    use reorder_recommender::NoSuggestionReason;

    use crate::history_store::InMemoryOrderHistoryStore;
    use crate::renderer::InMemoryRenderer;
    use crate::session_store::InMemorySessionStore;

    type TestAssistant = ReorderAssistant<
        Arc<InMemoryOrderHistoryStore>,
        Arc<InMemorySessionStore>,
        Arc<InMemoryEventBus<EventEnvelope<ReorderAuthorized>>>,
        Arc<InMemoryRenderer>,
    >;

    struct Fixture {
        assistant: TestAssistant,
        history: Arc<InMemoryOrderHistoryStore>,
        bus: Arc<InMemoryEventBus<EventEnvelope<ReorderAuthorized>>>,
        renderer: Arc<InMemoryRenderer>,
    }

    fn fixture() -> Fixture {
        let history = Arc::new(InMemoryOrderHistoryStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let renderer = Arc::new(InMemoryRenderer::new());
        let assistant = ReorderAssistant::new(
            history.clone(),
            Arc::new(InMemorySessionStore::new()),
            bus.clone(),
            renderer.clone(),
            &ReorderConfig::default(),
        )
        .unwrap();
        Fixture {
            assistant,
            history,
            bus,
            renderer,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn weekly_history(history: &InMemoryOrderHistoryStore, user: UserId, weeks: i64) {
        for week in 0..weeks {
            let lines = vec![
                OrderLine::new("milk".parse::<ItemId>().unwrap(), 1).unwrap(),
                OrderLine::new("bread".parse::<ItemId>().unwrap(), 2).unwrap(),
            ];
            let record =
                OrderRecord::new(user, OrderId::new(), start() + Duration::weeks(week), lines).unwrap();
            history.append_order(&record).unwrap();
        }
    }

    #[test]
    fn cold_start_yields_no_suggestion_and_no_session() {
        let f = fixture();
        let user = UserId::new();

        let outcome = f.assistant.suggest(user, start()).unwrap();
        assert_eq!(
            outcome.no_suggestion_reason(),
            Some(NoSuggestionReason::EmptyHistory)
        );
        assert!(f.assistant.active_session(user, start()).unwrap().is_none());
        assert!(f.renderer.rendered().is_empty());
    }

    #[test]
    fn suggest_opens_session_and_renders() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);

        let outcome = f.assistant.suggest(user, now).unwrap();
        let suggestion = outcome.suggestion().unwrap();

        let active = f.assistant.active_session(user, now).unwrap().unwrap();
        assert_eq!(active.id_typed(), suggestion.suggestion_id());
        assert_eq!(active.expires_at(), Some(now + Duration::hours(24)));
        assert_eq!(f.renderer.rendered(), vec![suggestion.clone()]);
    }

    #[test]
    fn second_suggest_while_active_is_a_session_conflict() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);

        f.assistant.suggest(user, now).unwrap();
        let err = f
            .assistant
            .suggest(user, now + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::SessionConflict(_))));
    }

    #[test]
    fn timed_out_session_does_not_block_a_new_one() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);

        let first = f.assistant.suggest(user, now).unwrap();
        let first_id = first.suggestion().unwrap().suggestion_id();

        let later = now + Duration::hours(25);
        let second = f.assistant.suggest(user, later).unwrap();
        assert_ne!(second.suggestion().unwrap().suggestion_id(), first_id);
        assert_eq!(
            f.assistant.session(first_id).unwrap().status(),
            SessionStatus::Expired
        );
    }

    #[test]
    fn confirm_publishes_authorization() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);
        let sub = f.bus.subscribe();

        let id = f
            .assistant
            .suggest(user, now)
            .unwrap()
            .suggestion()
            .unwrap()
            .suggestion_id();
        let decision = f.assistant.confirm(id, now + Duration::hours(1)).unwrap();

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        let envelope = &published[0];
        assert_eq!(envelope.user_id(), user);
        assert_eq!(envelope.event_type(), "reorder.authorized");
        assert_eq!(envelope.aggregate_type(), SESSION_AGGREGATE_TYPE);
        assert_eq!(Some(envelope.payload().final_items.clone()), decision.final_items);
        assert!(f.assistant.active_session(user, now).unwrap().is_none());
    }

    #[test]
    fn cancel_publishes_nothing() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);
        let sub = f.bus.subscribe();

        let id = f
            .assistant
            .suggest(user, now)
            .unwrap()
            .suggestion()
            .unwrap()
            .suggestion_id();
        f.assistant.cancel(id, now).unwrap();

        assert!(sub.drain().is_empty());
        assert_eq!(
            f.assistant.session_status(id, now).unwrap(),
            SessionStatus::Cancelled
        );
    }

    #[test]
    fn stale_confirm_is_rejected_and_expiry_recorded() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);
        let sub = f.bus.subscribe();

        let id = f
            .assistant
            .suggest(user, now)
            .unwrap()
            .suggestion()
            .unwrap()
            .suggestion_id();
        let err = f
            .assistant
            .confirm(id, now + Duration::hours(25))
            .unwrap_err();

        assert!(matches!(err.as_domain(), Some(DomainError::StaleSuggestion(_))));
        assert_eq!(f.assistant.session(id).unwrap().status(), SessionStatus::Expired);
        assert!(sub.drain().is_empty());
    }

    /// Bus that rejects the first `failures` publishes, then forwards.
    struct FlakyBus {
        inner: InMemoryEventBus<EventEnvelope<ReorderAuthorized>>,
        failures: std::sync::Mutex<u32>,
    }

    impl EventBus<EventEnvelope<ReorderAuthorized>> for FlakyBus {
        type Error = String;

        fn publish(&self, message: EventEnvelope<ReorderAuthorized>) -> Result<(), Self::Error> {
            let mut remaining = self.failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err("broker unavailable".to_string());
            }
            self.inner.publish(message).map_err(|e| format!("{e:?}"))
        }

        fn subscribe(&self) -> reorder_events::Subscription<EventEnvelope<ReorderAuthorized>> {
            self.inner.subscribe()
        }
    }

    #[test]
    fn failed_publish_can_be_sent_again() {
        let history = Arc::new(InMemoryOrderHistoryStore::new());
        let bus = Arc::new(FlakyBus {
            inner: InMemoryEventBus::new(),
            failures: std::sync::Mutex::new(1),
        });
        let assistant = ReorderAssistant::new(
            history.clone(),
            Arc::new(InMemorySessionStore::new()),
            bus.clone(),
            Arc::new(InMemoryRenderer::new()),
            &ReorderConfig::default(),
        )
        .unwrap();
        let user = UserId::new();
        weekly_history(&history, user, 3);
        let now = start() + Duration::weeks(3);
        let sub = bus.subscribe();

        let id = assistant
            .suggest(user, now)
            .unwrap()
            .suggestion()
            .unwrap()
            .suggestion_id();
        let err = assistant.confirm(id, now + Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AssistantError::Publish(_)));
        assert!(sub.drain().is_empty());

        // The decision stuck; a retry confirm is refused.
        assert_eq!(assistant.session(id).unwrap().status(), SessionStatus::Confirmed);
        let retry = assistant.confirm(id, now + Duration::hours(2)).unwrap_err();
        assert!(matches!(
            retry.as_domain(),
            Some(DomainError::InvalidStateTransition { .. })
        ));

        assistant.republish_authorization(id).unwrap();
        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload().suggestion_id, id);
        assert_eq!(published[0].payload().final_items.len(), 2);
        assert_eq!(assistant.sessions().load_stream(id).unwrap().len(), 2);
    }

    #[test]
    fn republish_requires_an_authorizing_decision() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 3);
        let now = start() + Duration::weeks(3);
        let sub = f.bus.subscribe();

        let id = f
            .assistant
            .suggest(user, now)
            .unwrap()
            .suggestion()
            .unwrap()
            .suggestion_id();
        let err = f.assistant.republish_authorization(id).unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::InvalidStateTransition { .. })
        ));

        f.assistant.cancel(id, now).unwrap();
        assert!(f.assistant.republish_authorization(id).is_err());
        assert!(sub.drain().is_empty());

        let unknown = f.assistant.republish_authorization(SuggestionId::new()).unwrap_err();
        assert_eq!(unknown.as_domain(), Some(&DomainError::NotFound));
    }

    #[test]
    fn unknown_suggestion_is_not_found() {
        let f = fixture();
        let err = f.assistant.confirm(SuggestionId::new(), start()).unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::NotFound));
    }

    #[test]
    fn stats_are_recomputed_only_when_revision_changes() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 2);

        let first = f.assistant.item_stats(user).unwrap();
        let again = f.assistant.item_stats(user).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        weekly_history(&f.history, user, 1);
        let refreshed = f.assistant.item_stats(user).unwrap();
        assert_eq!(refreshed.revision, 3);
        assert_eq!(
            refreshed.stats.get(&"milk".parse().unwrap()).unwrap().purchase_count,
            3
        );
    }

    #[test]
    fn malformed_records_are_dropped_and_counted() {
        let f = fixture();
        let user = UserId::new();
        weekly_history(&f.history, user, 2);
        f.history
            .append_raw(user, serde_json::json!({"items": "garbage"}))
            .unwrap();

        let cached = f.assistant.item_stats(user).unwrap();
        assert_eq!(cached.dropped_records, 1);
        assert_eq!(cached.stats.len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = ReorderConfig::default();
        config.ranker.top_k = 0;

        let result = ReorderAssistant::new(
            InMemoryOrderHistoryStore::new(),
            InMemorySessionStore::new(),
            InMemoryEventBus::<EventEnvelope<ReorderAuthorized>>::new(),
            InMemoryRenderer::new(),
            &config,
        );
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }
}
