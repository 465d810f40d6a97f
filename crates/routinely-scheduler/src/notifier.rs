//! Reminder delivery for due triggers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, warn};

use routinely_notify::{DesktopSink, SpeechSink};
use routinely_storage::TaskStore;
use routinely_types::Priority;

/// How long a single desktop delivery may take before it is abandoned.
const DESKTOP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long one speech round may take before it is abandoned.
const SPEECH_TIMEOUT: Duration = Duration::from_secs(30);
/// Banner display time passed to the desktop backend, in seconds.
const BANNER_SECS: u32 = 5;

/// Delivers one reminder: desktop notification plus repeated speech.
///
/// Every sub-step is isolated: a slow or failing delivery channel is logged
/// and never surfaces an error to the dispatcher loop.
pub struct Notifier {
    store: Arc<TaskStore>,
    desktop: Arc<dyn DesktopSink>,
    speech: Arc<dyn SpeechSink>,
    speech_repeats: u32,
    speech_pause: Duration,
}

impl Notifier {
    pub fn new(
        store: Arc<TaskStore>,
        desktop: Arc<dyn DesktopSink>,
        speech: Arc<dyn SpeechSink>,
        speech_repeats: u32,
        speech_pause: Duration,
    ) -> Self {
        Self {
            store,
            desktop,
            speech,
            speech_repeats,
            speech_pause,
        }
    }

    /// Fire a reminder for a due trigger.
    ///
    /// Re-checks the task's current state first: the compile snapshot may be
    /// stale by fire time, and a completed or deleted task must never notify.
    pub async fn notify(&self, task_id: i64, title: &str, priority: Priority) {
        match self.store.get_task(task_id).await {
            Ok(Some(task)) if task.completed => {
                debug!(task_id, "Task completed since compile, skipping reminder");
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(task_id, "Task deleted since compile, skipping reminder");
                return;
            }
            Err(e) => {
                warn!(task_id, "Could not re-check task before reminder: {e}");
                return;
            }
        }

        if let Err(e) = self.store.mark_reminder_sent(task_id).await {
            warn!(task_id, "Failed to mark reminder_sent: {e}");
        }

        let now_str = Local::now().format("%I:%M %p").to_string();
        let message = format!("It's {now_str}. Time to {title}!");
        tracing::info!(task_id, %title, "Reminder due: {message}");

        // Desktop notification, best-effort
        match tokio::time::timeout(
            DESKTOP_TIMEOUT,
            self.desktop.send("Routine Reminder", &message, BANNER_SECS),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task_id, backend = self.desktop.name(), "Notification error: {e}"),
            Err(_) => warn!(task_id, backend = self.desktop.name(), "Notification timed out"),
        }

        // Speech, repeated for audibility, each round isolated
        let speech_message = speech_message(title, priority);
        for round in 0..self.speech_repeats {
            debug!(
                task_id,
                round = round + 1,
                total = self.speech_repeats,
                "Speaking reminder"
            );
            match tokio::time::timeout(SPEECH_TIMEOUT, self.speech.say(&speech_message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task_id, backend = self.speech.name(), "Speech error: {e}"),
                Err(_) => warn!(task_id, backend = self.speech.name(), "Speech timed out"),
            }
            if round + 1 < self.speech_repeats {
                tokio::time::sleep(self.speech_pause).await;
            }
        }
    }
}

/// Spoken message, toned by priority.
fn speech_message(title: &str, priority: Priority) -> String {
    match priority {
        Priority::High => {
            format!("Important reminder: {title}. Please complete this task soon.")
        }
        Priority::Medium => format!("Reminder: {title}."),
        Priority::Low => format!("Gentle reminder: {title}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use routinely_types::{Category, NewTask, RepeatKind};
    use tokio::sync::Mutex;

    /// Records every delivery instead of performing it.
    pub(crate) struct RecordingSinks {
        pub notifications: Mutex<Vec<String>>,
        pub spoken: Mutex<Vec<String>>,
    }

    impl RecordingSinks {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                notifications: Mutex::new(Vec::new()),
                spoken: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl DesktopSink for RecordingSinks {
        fn name(&self) -> &str {
            "recording"
        }
        fn available(&self) -> bool {
            true
        }
        async fn send(&self, _title: &str, body: &str, _timeout_secs: u32) -> anyhow::Result<()> {
            self.notifications.lock().await.push(body.to_string());
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl SpeechSink for RecordingSinks {
        fn name(&self) -> &str {
            "recording"
        }
        fn available(&self) -> bool {
            true
        }
        async fn say(&self, text: &str) -> anyhow::Result<()> {
            self.spoken.lock().await.push(text.to_string());
            Ok(())
        }
    }

    /// Fails every delivery.
    struct FailingSinks;

    #[async_trait::async_trait]
    impl DesktopSink for FailingSinks {
        fn name(&self) -> &str {
            "failing"
        }
        fn available(&self) -> bool {
            true
        }
        async fn send(&self, _: &str, _: &str, _: u32) -> anyhow::Result<()> {
            anyhow::bail!("backend down")
        }
    }

    #[async_trait::async_trait]
    impl SpeechSink for FailingSinks {
        fn name(&self) -> &str {
            "failing"
        }
        fn available(&self) -> bool {
            true
        }
        async fn say(&self, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("backend down")
        }
    }

    async fn seeded_store(completed: bool) -> (Arc<TaskStore>, i64) {
        let store = Arc::new(TaskStore::open_in_memory().unwrap());
        let task = store
            .create_task(NewTask {
                title: "Call mom".into(),
                time: "18:40".into(),
                date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
                repeat: RepeatKind::Daily,
                priority: Priority::High,
                category: Category::Personal,
            })
            .await
            .unwrap();
        if completed {
            store.set_completed(task.id, true).await.unwrap();
        }
        (store, task.id)
    }

    #[tokio::test]
    async fn test_notify_delivers_and_marks_sent() {
        let (store, id) = seeded_store(false).await;
        let sinks = RecordingSinks::new();
        let notifier = Notifier::new(
            store.clone(),
            sinks.clone(),
            sinks.clone(),
            2,
            Duration::ZERO,
        );

        notifier.notify(id, "Call mom", Priority::High).await;

        assert_eq!(sinks.notifications.lock().await.len(), 1);
        // Repeated speech rounds
        let spoken = sinks.spoken.lock().await;
        assert_eq!(spoken.len(), 2);
        assert!(spoken[0].starts_with("Important reminder: Call mom"));

        let task = store.get_task(id).await.unwrap().unwrap();
        assert!(task.reminder_sent);
    }

    #[tokio::test]
    async fn test_notify_skips_completed_task() {
        let (store, id) = seeded_store(true).await;
        let sinks = RecordingSinks::new();
        let notifier = Notifier::new(
            store.clone(),
            sinks.clone(),
            sinks.clone(),
            1,
            Duration::ZERO,
        );

        notifier.notify(id, "Call mom", Priority::High).await;

        assert!(sinks.notifications.lock().await.is_empty());
        assert!(sinks.spoken.lock().await.is_empty());
        let task = store.get_task(id).await.unwrap().unwrap();
        assert!(!task.reminder_sent);
    }

    #[tokio::test]
    async fn test_notify_skips_deleted_task() {
        let (store, id) = seeded_store(false).await;
        store.delete_task(id).await.unwrap();

        let sinks = RecordingSinks::new();
        let notifier = Notifier::new(
            store.clone(),
            sinks.clone(),
            sinks.clone(),
            1,
            Duration::ZERO,
        );

        notifier.notify(id, "Call mom", Priority::High).await;
        assert!(sinks.notifications.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_sinks_do_not_panic_and_still_mark_sent() {
        let (store, id) = seeded_store(false).await;
        let notifier = Notifier::new(
            store.clone(),
            Arc::new(FailingSinks),
            Arc::new(FailingSinks),
            2,
            Duration::ZERO,
        );

        // Must complete without error despite both channels failing
        notifier.notify(id, "Call mom", Priority::Medium).await;

        let task = store.get_task(id).await.unwrap().unwrap();
        assert!(task.reminder_sent);
    }

    #[test]
    fn test_speech_message_tone() {
        assert!(speech_message("Gym", Priority::High).starts_with("Important reminder"));
        assert!(speech_message("Gym", Priority::Medium).starts_with("Reminder"));
        assert!(speech_message("Gym", Priority::Low).starts_with("Gentle reminder"));
    }
}
