//! Scheduler control surface and dispatcher loop.
//!
//! One `Scheduler` handle is constructed by the host application and shared
//! (`Arc`) into every caller that needs start/stop/refresh/status. Exactly
//! one background dispatcher task runs while the scheduler is started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use routinely_storage::TaskStore;
use routinely_types::{RepeatKind, SchedulerStatus};

use crate::notifier::Notifier;
use crate::trigger::{collect_due, compile_triggers, Trigger};
use crate::{Result, SchedulerError};

/// Bound on how long `stop()` waits for the dispatcher to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct LoopHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The reminder scheduler: owns the trigger set and the dispatcher lifecycle.
pub struct Scheduler {
    store: Arc<TaskStore>,
    notifier: Arc<Notifier>,
    poll_interval: Duration,
    running: AtomicBool,
    /// Set false by the dispatcher itself on exit; lets `status()` report
    /// loop liveness without touching the lifecycle lock.
    loop_alive: Arc<AtomicBool>,
    triggers: Arc<RwLock<Vec<Trigger>>>,
    /// Serializes start/stop so two concurrent starts can never spawn two loops.
    lifecycle: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    pub fn new(store: Arc<TaskStore>, notifier: Arc<Notifier>, poll_interval: Duration) -> Self {
        Self {
            store,
            notifier,
            poll_interval,
            running: AtomicBool::new(false),
            loop_alive: Arc::new(AtomicBool::new(false)),
            triggers: Arc::new(RwLock::new(Vec::new())),
            lifecycle: Mutex::new(None),
        }
    }

    /// Start the background dispatcher.
    ///
    /// Idempotent: a second `start()` warns and returns without spawning a
    /// second loop. Performs one synchronous compile pass before spawning,
    /// then returns immediately.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(existing) = lifecycle.as_ref() {
            if !existing.handle.is_finished() {
                warn!("Scheduler already running");
                return Ok(());
            }
        }

        self.running.store(true, Ordering::SeqCst);

        // Initial compile pass. A store outage here is recoverable: the loop
        // still starts and a later refresh rebuilds the set.
        if let Err(e) = self.refresh().await {
            warn!("Initial compile pass failed: {e}");
        }

        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();
        let triggers = self.triggers.clone();
        let notifier = self.notifier.clone();
        let poll_interval = self.poll_interval;
        let loop_alive = self.loop_alive.clone();

        loop_alive.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            run_dispatch_loop(triggers, notifier, poll_interval, cancel_child).await;
            loop_alive.store(false, Ordering::SeqCst);
        });

        *lifecycle = Some(LoopHandle { cancel, handle });
        info!(poll_secs = poll_interval.as_secs(), "Scheduler started");
        Ok(())
    }

    /// Stop the background dispatcher and clear the trigger set.
    ///
    /// Cooperative: cancels the loop and waits up to `STOP_TIMEOUT` for it to
    /// exit. A loop that fails to exit in time is reported as `LoopStuck`,
    /// never force-killed. Safe no-op when not running.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        self.running.store(false, Ordering::SeqCst);

        let Some(LoopHandle { cancel, handle }) = lifecycle.take() else {
            return Ok(());
        };
        cancel.cancel();

        let stuck = tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err();
        self.triggers.write().await.clear();

        if stuck {
            warn!("Dispatcher did not exit within {STOP_TIMEOUT:?}");
            return Err(SchedulerError::LoopStuck(STOP_TIMEOUT));
        }
        info!("Scheduler stopped");
        Ok(())
    }

    /// Rebuild the trigger set from a fresh task snapshot.
    ///
    /// Safe to call concurrently from request handlers; does not touch the
    /// dispatcher's running state. On store failure the previous trigger set
    /// is left in place rather than cleared.
    pub async fn refresh(&self) -> Result<()> {
        let now = Local::now().naive_local();
        let tasks = self.store.list_schedulable(now.date()).await?;
        let compiled = compile_triggers(&tasks, now);

        info!(
            tasks = tasks.len(),
            triggers = compiled.len(),
            "Compiled trigger set"
        );

        // Single assignment under the write lock: the dispatcher can never
        // observe a half-rebuilt set.
        *self.triggers.write().await = compiled;
        Ok(())
    }

    /// Read-only status snapshot. Never blocks on the dispatcher.
    pub async fn status(&self) -> SchedulerStatus {
        let triggers = self.triggers.read().await;

        let mut status = SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            loop_alive: self.loop_alive.load(Ordering::SeqCst),
            total_triggers: triggers.len(),
            ..Default::default()
        };
        for trigger in triggers.iter() {
            match trigger.recurrence.kind() {
                RepeatKind::Once => status.once += 1,
                RepeatKind::Daily => status.daily += 1,
                RepeatKind::Weekly => status.weekly += 1,
                RepeatKind::Monthly => status.monthly += 1,
            }
        }
        status
    }
}

/// The trigger clock: polls the trigger set and fires due reminders.
///
/// Holds the write lock only to collect-and-mark due triggers; delivery runs
/// after the lock is released so a slow sink never blocks `refresh()`.
async fn run_dispatch_loop(
    triggers: Arc<RwLock<Vec<Trigger>>>,
    notifier: Arc<Notifier>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    info!("Dispatcher loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let now = Local::now().naive_local();
        let due = collect_due(&mut *triggers.write().await, now);

        for fired in due {
            if cancel.is_cancelled() {
                return;
            }
            notifier
                .notify(fired.task_id, &fired.title, fired.priority)
                .await;
        }
    }

    info!("Dispatcher loop stopped");
}
