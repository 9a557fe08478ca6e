use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    recurrence::{Recurrence, RecurrencePattern},
    storage::StoreError,
};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Task status lifecycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Category {
    Work,
    Personal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Rejections raised before any state is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name is required")]
    NameRequired,
    #[error("name is {len} characters, at most {max} allowed", max = MAX_NAME_LEN)]
    NameTooLong { len: usize },
    #[error(
        "description is {len} characters, at most {max} allowed",
        max = MAX_DESCRIPTION_LEN
    )]
    DescriptionTooLong { len: usize },
    #[error("end time {end} must be after start time {start}")]
    EndNotAfterStart { start: NaiveTime, end: NaiveTime },
    #[error("recurring tasks need an end date")]
    MissingEndDate,
    #[error("end date {end_date} is before start date {date}")]
    EndDateBeforeStart { date: NaiveDate, end_date: NaiveDate },
    #[error("weekly recurrence needs at least one weekday")]
    WeeklyWithoutDays,
}

/// Canonical task definition; recurring templates expand into occurrences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    /// Day of the task, or of the first occurrence when recurring.
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Last day a recurrence applies.
    pub end_date: Option<NaiveDate>,
    pub recurrence: Option<Recurrence>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every store update.
    #[serde(default)]
    pub version: u64,
}

impl TaskTemplate {
    pub fn new(id: Uuid, draft: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            category: draft.category,
            priority: draft.priority,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            end_date: draft.end_date,
            recurrence: draft.recurrence,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_len = self.name.chars().count();
        if self.name.trim().is_empty() {
            return Err(ValidationError::NameRequired);
        }
        if name_len > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong { len: name_len });
        }
        if let Some(description) = &self.description {
            let len = description.chars().count();
            if len > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::DescriptionTooLong { len });
            }
        }
        if self.end_time <= self.start_time {
            return Err(ValidationError::EndNotAfterStart {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if let Some(recurrence) = &self.recurrence {
            let end_date = self.end_date.ok_or(ValidationError::MissingEndDate)?;
            if end_date < self.date {
                return Err(ValidationError::EndDateBeforeStart {
                    date: self.date,
                    end_date,
                });
            }
            if recurrence.pattern == RecurrencePattern::Weekly && recurrence.week_days.is_empty() {
                return Err(ValidationError::WeeklyWithoutDays);
            }
        }
        Ok(())
    }

    /// Recurrence rule and last day, present only when both are set.
    pub fn recurring_window(&self) -> Option<(&Recurrence, NaiveDate)> {
        match (&self.recurrence, self.end_date) {
            (Some(recurrence), Some(end_date)) => Some((recurrence, end_date)),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring_window().is_some()
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }
}

/// User input for a new template; id and status are assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub end_date: Option<NaiveDate>,
    pub recurrence: Option<Recurrence>,
}

/// Partial update. Nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub end_date: Option<Option<NaiveDate>>,
    pub recurrence: Option<Option<Recurrence>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch moves the template on the calendar.
    pub fn touches_schedule(&self) -> bool {
        self.date.is_some() || self.end_date.is_some() || self.recurrence.is_some()
    }

    pub fn apply(&self, template: &mut TaskTemplate, at: DateTime<Utc>) {
        if let Some(name) = &self.name {
            template.name = name.clone();
        }
        if let Some(description) = &self.description {
            template.description = description.clone();
        }
        if let Some(category) = self.category {
            template.category = category;
        }
        if let Some(priority) = self.priority {
            template.priority = priority;
        }
        if let Some(date) = self.date {
            template.date = date;
        }
        if let Some(start_time) = self.start_time {
            template.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            template.end_time = end_time;
        }
        if let Some(end_date) = self.end_date {
            template.end_date = end_date;
        }
        if let Some(recurrence) = &self.recurrence {
            template.recurrence = recurrence.clone();
        }
        if let Some(status) = self.status {
            template.status = status;
        }
        template.updated_at = at;
        template.version += 1;
    }

    /// Copy of `template` with the patch applied, for validating before writing.
    pub fn applied_to(&self, template: &TaskTemplate, at: DateTime<Utc>) -> TaskTemplate {
        let mut next = template.clone();
        self.apply(&mut next, at);
        next
    }
}

/// Authoritative pool of task templates.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, template: TaskTemplate) -> Result<Uuid, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<TaskTemplate>, StoreError>;
    /// Applies `patch` stamped with `at`. Fails with `StoreError::NotFound`
    /// for unknown ids.
    async fn update(
        &self,
        id: Uuid,
        patch: TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<TaskTemplate, StoreError>;
    /// Returns whether a template was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn list(&self) -> Result<Vec<TaskTemplate>, StoreError>;
}
