use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    ids::{IdGenerator, UuidGenerator},
    occurrence::{materialize, materialize_between, occurrence_on, Occurrence, OccurrenceKey},
    schedule::DaySchedule,
    session::{
        ActiveSession, CompletedTask, DailyHistory, HistoryArchive, SessionRollover, SessionState,
        SessionStore, SessionSummary,
    },
    storage::StoreError,
    tasks::{NewTask, TaskPatch, TaskStatus, TaskStore, TaskTemplate, ValidationError},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),
    /// A transition that would break the lifecycle rules; nothing was changed.
    #[error("conflict: {reason}")]
    Conflict { reason: String },
    #[error("task {id} not found")]
    NotFound { id: Uuid },
    #[error("task {id} does not occur on {date}")]
    NotScheduled { id: Uuid, date: NaiveDate },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn conflict(reason: impl Into<String>) -> TrackerError {
    TrackerError::Conflict {
        reason: reason.into(),
    }
}

/// Maps a store-level miss on `id` to `TrackerError::NotFound`.
fn missing(id: Uuid) -> impl FnOnce(StoreError) -> TrackerError {
    move |err| match err {
        StoreError::NotFound { .. } => TrackerError::NotFound { id },
        other => TrackerError::Store(other),
    }
}

/// Result of ending a session: the archived entry and the summary to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedSession {
    pub entry: DailyHistory,
    pub summary: SessionSummary,
}

/// Task pool aggregate: owns the single active-session slot and is the only
/// place status transitions happen.
///
/// Every read-modify-write goes through one async gate, so two callers
/// sharing a tracker cannot both start a timer.
pub struct Tracker<T, H, S> {
    tasks: T,
    history: H,
    sessions: S,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    rollover: SessionRollover,
    gate: Mutex<()>,
}

impl<T, H, S> Tracker<T, H, S>
where
    T: TaskStore,
    H: HistoryArchive,
    S: SessionStore,
{
    pub fn new(tasks: T, history: H, sessions: S) -> Self {
        Self {
            tasks,
            history,
            sessions,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            rollover: SessionRollover::default(),
            gate: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn with_rollover(mut self, rollover: SessionRollover) -> Self {
        self.rollover = rollover;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: NewTask) -> Result<TaskTemplate, TrackerError> {
        let template = TaskTemplate::new(self.ids.next_id(), draft, self.clock.now());
        template.validate()?;

        let _gate = self.gate.lock().await;
        self.tasks.create(template.clone()).await?;
        info!(id = %template.id, recurring = template.is_recurring(), "task created");
        Ok(template)
    }

    pub async fn get(&self, id: Uuid) -> Result<TaskTemplate, TrackerError> {
        self.tasks
            .get(id)
            .await?
            .ok_or(TrackerError::NotFound { id })
    }

    pub async fn list(&self) -> Result<Vec<TaskTemplate>, TrackerError> {
        Ok(self.tasks.list().await?)
    }

    /// Field edits. Allowed in any state, but never change status; a task that
    /// is in progress cannot be moved on the calendar.
    #[instrument(skip(self, patch))]
    pub async fn edit(&self, id: Uuid, patch: TaskPatch) -> Result<TaskTemplate, TrackerError> {
        if patch.status.is_some() {
            return Err(conflict("status changes go through start, pause and complete"));
        }

        let _gate = self.gate.lock().await;
        let current = self.get(id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        if patch.touches_schedule() && current.status == TaskStatus::InProgress {
            return Err(conflict(format!(
                "task {id} is in progress; pause it before changing its date or recurrence"
            )));
        }
        patch.applied_to(&current, self.clock.now()).validate()?;

        let updated = self
            .tasks
            .update(id, patch, self.clock.now())
            .await
            .map_err(missing(id))?;
        debug!(version = updated.version, "task edited");
        Ok(updated)
    }

    /// Removes a template. Unknown ids are reported as `NotFound`.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), TrackerError> {
        let _gate = self.gate.lock().await;
        let template = self.get(id).await?;
        let mut state = self.sessions.load().await?;
        if !self.tasks.delete(id).await? {
            return Err(TrackerError::NotFound { id });
        }

        if state.active.as_ref().is_some_and(|a| a.task.id == id) {
            state.active = None;
            if let Err(err) = self.sessions.save(&state).await {
                self.reinsert(template).await;
                return Err(err.into());
            }
            warn!("deleted the running task; its timer was discarded");
        }
        info!("task deleted");
        Ok(())
    }

    /// `Pending -> InProgress` against today's occurrence.
    #[instrument(skip(self))]
    pub async fn start(&self, id: Uuid) -> Result<ActiveSession, TrackerError> {
        let _gate = self.gate.lock().await;
        let template = self.get(id).await?;
        let mut state = self.sessions.load().await?;

        if let Some(active) = &state.active {
            return Err(conflict(format!(
                "task {} is already in progress",
                active.task.id
            )));
        }
        let pool = self.tasks.list().await?;
        if let Some(busy) = pool.iter().find(|t| t.status == TaskStatus::InProgress) {
            return Err(conflict(format!("task {} is already in progress", busy.id)));
        }
        if template.status != TaskStatus::Pending {
            return Err(conflict(format!(
                "task {id} is {:?}; only pending tasks can be started",
                template.status
            )));
        }

        let today = self.clock.today();
        if template.is_recurring() {
            let occurrence =
                occurrence_on(&template, today).ok_or(TrackerError::NotScheduled { id, date: today })?;
            if state.is_completed(&occurrence.key) {
                return Err(conflict(format!(
                    "occurrence {} is already completed",
                    occurrence.key
                )));
            }
        }

        let updated = self
            .tasks
            .update(id, TaskPatch::status(TaskStatus::InProgress), self.clock.now())
            .await
            .map_err(missing(id))?;
        let snapshot = if updated.is_recurring() {
            Occurrence::on(&updated, today).task
        } else {
            updated
        };

        let session = ActiveSession {
            task: snapshot,
            started_at: self.clock.now(),
            occurrence_date: today,
        };
        state.active = Some(session.clone());
        if let Err(err) = self.sessions.save(&state).await {
            self.restore_status(id, TaskStatus::Pending).await;
            return Err(err.into());
        }
        info!(occurrence = %session.occurrence_key(), "timer started");
        Ok(session)
    }

    /// `InProgress -> Pending`. The elapsed time is dropped.
    #[instrument(skip(self))]
    pub async fn pause(&self, id: Uuid) -> Result<TaskTemplate, TrackerError> {
        let _gate = self.gate.lock().await;
        let mut state = self.sessions.load().await?;
        if !state.active.as_ref().is_some_and(|a| a.task.id == id) {
            return Err(conflict(format!("task {id} is not in progress")));
        }

        let updated = self
            .tasks
            .update(id, TaskPatch::status(TaskStatus::Pending), self.clock.now())
            .await
            .map_err(missing(id))?;
        state.active = None;
        if let Err(err) = self.sessions.save(&state).await {
            self.restore_status(id, TaskStatus::InProgress).await;
            return Err(err.into());
        }
        info!("timer paused");
        Ok(updated)
    }

    /// `InProgress -> Completed`.
    ///
    /// One-off tasks leave the pool. Recurring tasks stay; only the session's
    /// occurrence is recorded as completed. The completed list is newest first.
    #[instrument(skip(self))]
    pub async fn complete(&self, id: Uuid) -> Result<CompletedTask, TrackerError> {
        let _gate = self.gate.lock().await;
        let mut state = self.sessions.load().await?;
        let active = match state.active.take() {
            Some(active) if active.task.id == id => active,
            _ => return Err(conflict(format!("task {id} is not in progress"))),
        };
        let template = self.get(id).await?;

        let record = CompletedTask::from_session(&active, self.clock.now());
        if template.is_recurring() {
            state
                .completed_occurrences
                .insert(OccurrenceKey::dated(id, active.occurrence_date));
            self.tasks
                .update(id, TaskPatch::status(TaskStatus::Pending), self.clock.now())
                .await
                .map_err(missing(id))?;
        } else {
            self.tasks.delete(id).await?;
        }
        state.completed.insert(0, record.clone());
        if let Err(err) = self.sessions.save(&state).await {
            if template.is_recurring() {
                self.restore_status(id, TaskStatus::InProgress).await;
            } else {
                self.reinsert(template).await;
            }
            return Err(err.into());
        }

        info!(duration = record.duration, "task completed");
        Ok(record)
    }

    /// Undoes a status write after the session ledger refused the matching
    /// save, so status and ledger stay in step.
    async fn restore_status(&self, id: Uuid, status: TaskStatus) {
        let patch = TaskPatch::status(status);
        if let Err(err) = self.tasks.update(id, patch, self.clock.now()).await {
            warn!(%id, error = %err, "could not restore task status");
        }
    }

    /// Puts back a template removed just before a failed ledger save.
    async fn reinsert(&self, template: TaskTemplate) {
        let id = template.id;
        if let Err(err) = self.tasks.create(template).await {
            warn!(%id, error = %err, "could not restore removed task");
        }
    }

    pub async fn active(&self) -> Result<Option<ActiveSession>, TrackerError> {
        Ok(self.sessions.load().await?.active)
    }

    /// Running timer and its elapsed seconds, recomputed from the clock.
    pub async fn elapsed(&self) -> Result<Option<(ActiveSession, u64)>, TrackerError> {
        let now = self.clock.now();
        Ok(self.active().await?.map(|active| {
            let secs = active.elapsed_secs(now);
            (active, secs)
        }))
    }

    pub async fn completed(&self) -> Result<Vec<CompletedTask>, TrackerError> {
        Ok(self.sessions.load().await?.completed)
    }

    /// Running timer, completions and completed occurrences in one read.
    pub async fn session_state(&self) -> Result<SessionState, TrackerError> {
        Ok(self.sessions.load().await?)
    }

    pub async fn schedule_for(&self, date: NaiveDate) -> Result<DaySchedule, TrackerError> {
        let pool = self.tasks.list().await?;
        let state = self.sessions.load().await?;
        Ok(DaySchedule::build(&pool, date, &state))
    }

    pub async fn today(&self) -> Result<DaySchedule, TrackerError> {
        self.schedule_for(self.clock.today()).await
    }

    /// Occurrences of one template, optionally bounded to a window.
    pub async fn occurrences(
        &self,
        id: Uuid,
        window: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<Occurrence>, TrackerError> {
        let template = self.get(id).await?;
        Ok(match window {
            Some((from, to)) => materialize_between(&template, from, to),
            None => materialize(&template),
        })
    }

    pub async fn summary(&self) -> Result<SessionSummary, TrackerError> {
        let pool = self.tasks.list().await?;
        Ok(self.sessions.load().await?.summary(&pool, self.clock.today()))
    }

    /// Archives today's pool and completions. The pool itself is kept; the
    /// completed list is cleared only under `SessionRollover::Reset`.
    #[instrument(skip(self))]
    pub async fn end_session(&self) -> Result<EndedSession, TrackerError> {
        let _gate = self.gate.lock().await;
        let pool = self.tasks.list().await?;
        let mut state = self.sessions.load().await?;

        let entry = DailyHistory {
            date: self.clock.today(),
            tasks: pool,
            completed_tasks: state.completed.clone(),
        };
        let summary = entry.summary();
        self.history.append(entry.clone()).await?;

        if self.rollover == SessionRollover::Reset {
            state.completed.clear();
            self.sessions.save(&state).await?;
        }
        info!(
            date = %entry.date,
            completed = summary.total_completed,
            rollover = ?self.rollover,
            "session archived"
        );
        Ok(EndedSession { entry, summary })
    }

    pub async fn history(&self) -> Result<Vec<DailyHistory>, TrackerError> {
        Ok(self.history.list().await?)
    }
}
