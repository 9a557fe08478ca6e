use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    occurrence::OccurrenceKey,
    storage::StoreError,
    tasks::{TaskStatus, TaskTemplate},
};

/// The single running timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveSession {
    /// Snapshot taken when the timer started.
    pub task: TaskTemplate,
    pub started_at: DateTime<Utc>,
    /// Day the session was started against.
    pub occurrence_date: NaiveDate,
}

impl ActiveSession {
    pub fn occurrence_key(&self) -> OccurrenceKey {
        if self.task.is_recurring() {
            OccurrenceKey::dated(self.task.id, self.occurrence_date)
        } else {
            OccurrenceKey::sole(self.task.id)
        }
    }

    /// Time since the timer started, derived from timestamps on every call.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        clamp_non_negative(now - self.started_at)
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        whole_seconds(self.elapsed(now))
    }
}

/// A finished timer. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedTask {
    pub task: TaskTemplate,
    pub occurrence_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Whole seconds between `started_at` and `completed_at`.
    pub duration: u64,
}

impl CompletedTask {
    pub fn from_session(session: &ActiveSession, completed_at: DateTime<Utc>) -> Self {
        let mut task = session.task.clone();
        task.status = TaskStatus::Completed;
        Self {
            task,
            occurrence_date: session.occurrence_date,
            started_at: session.started_at,
            completed_at,
            duration: session.elapsed_secs(completed_at),
        }
    }
}

/// Archived snapshot of one ended session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyHistory {
    pub date: NaiveDate,
    pub tasks: Vec<TaskTemplate>,
    pub completed_tasks: Vec<CompletedTask>,
}

impl DailyHistory {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_parts(&self.tasks, &self.completed_tasks, self.date)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub total_tasks: usize,
    pub total_completed: usize,
    /// Seconds.
    pub total_duration: u64,
}

impl SessionSummary {
    /// Totals for `date`. A recurring template whose occurrence on `date` is
    /// already among `completed` is counted once, as completed.
    pub fn from_parts(
        tasks: &[TaskTemplate],
        completed: &[CompletedTask],
        date: NaiveDate,
    ) -> Self {
        let done_today = |t: &TaskTemplate| {
            t.is_recurring()
                && completed
                    .iter()
                    .any(|c| c.task.id == t.id && c.occurrence_date == date)
        };
        let open = tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
            .filter(|t| !done_today(t))
            .count();
        Self {
            total_tasks: open + completed.len(),
            total_completed: completed.len(),
            total_duration: completed.iter().map(|c| c.duration).sum(),
        }
    }
}

/// What `end_session` does with the completed list after archiving it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionRollover {
    /// Keep completions; the next archive repeats them.
    #[default]
    CarryOver,
    /// Start the next session with an empty completed list.
    Reset,
}

/// Lifecycle ledger owned by the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub active: Option<ActiveSession>,
    #[serde(default)]
    pub completed: Vec<CompletedTask>,
    /// Completed days of recurring templates.
    #[serde(default)]
    pub completed_occurrences: BTreeSet<OccurrenceKey>,
}

impl SessionState {
    pub fn is_completed(&self, key: &OccurrenceKey) -> bool {
        self.completed_occurrences.contains(key)
    }

    pub fn summary(&self, pool: &[TaskTemplate], date: NaiveDate) -> SessionSummary {
        SessionSummary::from_parts(pool, &self.completed, date)
    }
}

/// Append-only log of ended sessions.
#[async_trait]
pub trait HistoryArchive: Send + Sync {
    async fn append(&self, entry: DailyHistory) -> Result<(), StoreError>;
    /// Most recent first.
    async fn list(&self) -> Result<Vec<DailyHistory>, StoreError>;
}

/// Persistence for the tracker's [`SessionState`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Empty state when nothing was saved yet.
    async fn load(&self) -> Result<SessionState, StoreError>;
    async fn save(&self, state: &SessionState) -> Result<(), StoreError>;
}

/// `1h 2m 3s`; zero components are dropped, zero overall is `0s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

fn clamp_non_negative(d: Duration) -> Duration {
    if d < Duration::zero() {
        Duration::zero()
    } else {
        d
    }
}

fn whole_seconds(d: Duration) -> u64 {
    u64::try_from(d.num_seconds()).unwrap_or(0)
}
