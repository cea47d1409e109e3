//! Background expiry of timed-out suggestion sessions.
//!
//! Expiry is already enforced lazily on every read; the sweeper only makes
//! it visible in the store without waiting for the user to come back.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use reorder_events::{EventBus, EventEnvelope};
use reorder_session::ReorderAuthorized;

use crate::assistant::{AssistantError, ReorderAssistant};
use crate::history_store::OrderHistoryStore;
use crate::renderer::SuggestionRenderer;
use crate::session_store::SessionStore;

/// Anything that can expire overdue sessions in one pass.
pub trait SessionExpirer: Send + Sync + 'static {
    fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, AssistantError>;
}

impl<H, S, B, R> SessionExpirer for ReorderAssistant<H, S, B, R>
where
    H: OrderHistoryStore + 'static,
    S: SessionStore + 'static,
    B: EventBus<EventEnvelope<ReorderAuthorized>> + 'static,
    R: SuggestionRenderer + 'static,
{
    fn expire_due(&self, now: DateTime<Utc>) -> Result<usize, AssistantError> {
        ReorderAssistant::expire_due(self, now)
    }
}

/// Sweeper schedule and retry policy.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ExpirySweeper {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for a running sweeper (shutdown + trigger hook).
#[derive(Debug)]
pub struct ExpirySweeperHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ExpirySweeperHandle {
    /// Request a sweep now. Triggers are coalesced; extra calls are no-ops.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the sweeper thread and wait for it to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl ExpirySweeper {
    /// Spawn the sweeper thread.
    ///
    /// Runs once on startup, then every `interval` and on `trigger()`.
    /// Failures are logged and retried with bounded exponential backoff; they
    /// never propagate.
    pub fn spawn<E>(&self, name: &'static str, expirer: Arc<E>) -> std::io::Result<ExpirySweeperHandle>
    where
        E: SessionExpirer,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || sweeper_loop(name, cfg, shutdown_rx, trigger_rx, expirer))?;

        Ok(ExpirySweeperHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn sweeper_loop<E>(
    name: &'static str,
    cfg: ExpirySweeper,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    expirer: Arc<E>,
) where
    E: SessionExpirer,
{
    info!(sweeper = name, "expiry sweeper started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        match expirer.expire_due(Utc::now()) {
            Ok(_) => failures = 0,
            Err(e) => {
                warn!(sweeper = name, error = %e, "expiry sweep failed");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
            }
        }
    }

    info!(sweeper = name, "expiry sweeper stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
