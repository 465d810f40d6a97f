//! routinely-scheduler: the background reminder subsystem.
//!
//! Derives a set of time triggers from the task store, polls them in a single
//! background loop, and fires desktop/speech reminders exactly once per
//! occurrence. The whole trigger set is rebuilt from a fresh task snapshot on
//! every `refresh()`; triggers are never patched individually.

pub mod notifier;
pub mod scheduler;
pub mod timefmt;
pub mod trigger;

use std::time::Duration;

pub use notifier::Notifier;
pub use scheduler::Scheduler;
pub use timefmt::normalize_time;
pub use trigger::{compile_triggers, Recurrence, Trigger};

use routinely_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("cannot parse time: '{0}'")]
    InvalidTimeFormat(String),
    #[error("task store unavailable: {0}")]
    Store(#[from] StorageError),
    #[error("dispatcher loop did not exit within {0:?}")]
    LoopStuck(Duration),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
