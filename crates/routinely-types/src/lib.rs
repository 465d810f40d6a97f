use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ──────────────────── Task Types ────────────────────

/// How often a task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatKind {
    /// Fires once, on the task's date.
    Once,
    Daily,
    /// Fires every week on the weekday of the task's anchor date.
    Weekly,
    /// Fires every month on the day-of-month of the task's anchor date.
    Monthly,
}

impl RepeatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatKind::Once => "once",
            RepeatKind::Daily => "daily",
            RepeatKind::Weekly => "weekly",
            RepeatKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RepeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(RepeatKind::Once),
            "daily" => Ok(RepeatKind::Daily),
            "weekly" => Ok(RepeatKind::Weekly),
            "monthly" => Ok(RepeatKind::Monthly),
            other => Err(format!("unknown repeat kind: {other}")),
        }
    }
}

/// Task priority. Affects notification tone, not scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Loose category bucket assigned by the natural-language parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Health,
    Study,
    Shopping,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Health => "health",
            Category::Study => "study",
            Category::Shopping => "shopping",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Category::Work),
            "personal" => Ok(Category::Personal),
            "health" => Ok(Category::Health),
            "study" => Ok(Category::Study),
            "shopping" => Ok(Category::Shopping),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// A user-defined task/routine with a scheduled time and recurrence rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// SQLite row id.
    pub id: i64,
    pub title: String,
    /// Wall-clock time of day as stored. May be in any of the accepted human
    /// formats; the scheduler normalizes it defensively before use.
    pub time: String,
    /// Calendar date the task is "for". Anchor for weekly/monthly recurrence.
    pub date: NaiveDate,
    pub repeat: RepeatKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub completed: bool,
    /// Set by the notifier after a successful fire.
    #[serde(default)]
    pub reminder_sent: bool,
    /// Unix millis.
    pub created_at: i64,
    pub updated_at: i64,
}

/// Payload for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub time: String,
    pub date: NaiveDate,
    #[serde(default = "default_repeat")]
    pub repeat: RepeatKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
}

fn default_repeat() -> RepeatKind {
    RepeatKind::Once
}

/// Partial update for a task. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.time.is_none()
            && self.date.is_none()
            && self.repeat.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.completed.is_none()
    }
}

// ──────────────────── Assistant Types ────────────────────

/// Structured fields extracted from a natural-language task description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTask {
    pub title: String,
    /// Canonical 24-hour "HH:MM".
    pub time: String,
    pub date: NaiveDate,
    pub priority: Priority,
    pub category: Category,
}

/// One saved chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub message: String,
    pub response: String,
    /// Unix millis.
    pub created_at: i64,
}

// ──────────────────── Scheduler Types ────────────────────

/// Read-only snapshot of the scheduler's state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether `start()` has been called without a matching `stop()`.
    pub running: bool,
    /// Whether the dispatcher loop task is still alive.
    pub loop_alive: bool,
    pub total_triggers: usize,
    pub once: usize,
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
}
