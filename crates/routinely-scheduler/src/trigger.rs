//! Trigger compilation and due-time evaluation.
//!
//! A trigger is a (task, fire rule) pair derived from one task row. The whole
//! set is recompiled from a fresh snapshot on every refresh; the dispatcher
//! only mutates `last_fired` to consume occurrences.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::{debug, warn};

use routinely_types::{Priority, RepeatKind, Task};

use crate::timefmt;

/// When a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Fire once, on the given date.
    Once(NaiveDate),
    /// Fire every day.
    Daily,
    /// Fire every week on this weekday.
    Weekly(Weekday),
    /// Fire every month on this day-of-month. Months without the day
    /// (e.g. day 31 in April) are skipped.
    Monthly(u32),
}

impl Recurrence {
    pub fn kind(&self) -> RepeatKind {
        match self {
            Recurrence::Once(_) => RepeatKind::Once,
            Recurrence::Daily => RepeatKind::Daily,
            Recurrence::Weekly(_) => RepeatKind::Weekly,
            Recurrence::Monthly(_) => RepeatKind::Monthly,
        }
    }

    /// Whether this rule has an occurrence on the given calendar day.
    fn matches_day(&self, day: NaiveDate) -> bool {
        match self {
            Recurrence::Once(date) => *date == day,
            Recurrence::Daily => true,
            Recurrence::Weekly(weekday) => day.weekday() == *weekday,
            Recurrence::Monthly(day_of_month) => day.day() == *day_of_month,
        }
    }
}

/// A scheduled-fire record derived from a task.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub task_id: i64,
    pub title: String,
    pub priority: Priority,
    /// Wall-clock fire time.
    pub at: NaiveTime,
    pub recurrence: Recurrence,
    /// Day on which this trigger last fired; consumes the current period so a
    /// trigger never double-fires when poll ticks and fire time don't align.
    pub last_fired: Option<NaiveDate>,
}

impl Trigger {
    /// Whether this trigger should fire at the given instant.
    pub fn due_at(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.at
            && self.last_fired != Some(now.date())
            && self.recurrence.matches_day(now.date())
    }

    /// A one-off trigger that has fired is finished and can be dropped.
    pub fn consumed(&self) -> bool {
        matches!(self.recurrence, Recurrence::Once(_)) && self.last_fired.is_some()
    }
}

/// Fields the dispatcher hands to the notifier for one due trigger.
#[derive(Debug, Clone)]
pub struct DueTrigger {
    pub task_id: i64,
    pub title: String,
    pub priority: Priority,
}

/// Compile a task snapshot into a fresh trigger set.
///
/// Tasks with an unparseable time are logged and skipped; one bad task never
/// aborts the pass. A trigger whose fire time already passed "now" starts
/// with the current period consumed, so compiling never fires a moment that
/// is already in the past.
pub fn compile_triggers(tasks: &[Task], now: NaiveDateTime) -> Vec<Trigger> {
    let today = now.date();
    let mut triggers = Vec::new();

    for task in tasks {
        let at = match timefmt::parse_time(&task.time) {
            Ok(at) => at,
            Err(e) => {
                warn!(task_id = task.id, title = %task.title, "Skipping task: {e}");
                continue;
            }
        };

        let recurrence = match task.repeat {
            RepeatKind::Once => {
                if task.date != today {
                    debug!(task_id = task.id, date = %task.date, "One-off task not for today, skipping");
                    continue;
                }
                Recurrence::Once(task.date)
            }
            RepeatKind::Daily => Recurrence::Daily,
            RepeatKind::Weekly => Recurrence::Weekly(task.date.weekday()),
            RepeatKind::Monthly => Recurrence::Monthly(task.date.day()),
        };

        let last_fired = (at < now.time()).then_some(today);

        triggers.push(Trigger {
            task_id: task.id,
            title: task.title.clone(),
            priority: task.priority,
            at,
            recurrence,
            last_fired,
        });
    }

    triggers
}

/// Collect triggers due at `now`, marking their current occurrence consumed
/// and dropping finished one-offs. Called by the dispatcher under the
/// trigger-set write lock.
pub fn collect_due(triggers: &mut Vec<Trigger>, now: NaiveDateTime) -> Vec<DueTrigger> {
    let mut due = Vec::new();
    for trigger in triggers.iter_mut() {
        if trigger.due_at(now) {
            trigger.last_fired = Some(now.date());
            due.push(DueTrigger {
                task_id: trigger.task_id,
                title: trigger.title.clone(),
                priority: trigger.priority,
            });
        }
    }
    triggers.retain(|t| !t.consumed());
    due
}
