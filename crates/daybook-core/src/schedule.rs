use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    occurrence::{select_for_date, Occurrence},
    session::SessionState,
    tasks::{TaskStatus, TaskTemplate},
};

/// One selected occurrence with its status for the viewed day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEntry {
    pub occurrence: Occurrence,
    pub status: TaskStatus,
    pub recurring: bool,
}

/// Everything visible on one calendar day.
///
/// Built once from [`select_for_date`]; [`DaySchedule::grid`] and
/// [`DaySchedule::timeline`] are two views of the same entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub entries: Vec<ScheduledEntry>,
}

impl DaySchedule {
    pub fn build(pool: &[TaskTemplate], date: NaiveDate, state: &SessionState) -> Self {
        let entries = select_for_date(pool, date)
            .into_iter()
            .map(|(template, occurrence)| ScheduledEntry {
                status: status_on(template, &occurrence, state),
                recurring: template.is_recurring(),
                occurrence,
            })
            .collect();
        Self { date, entries }
    }

    /// Entries in pool order.
    pub fn grid(&self) -> &[ScheduledEntry] {
        &self.entries
    }

    /// Entries bucketed by start hour; only hours with entries are present.
    pub fn timeline(&self) -> BTreeMap<u32, Vec<&ScheduledEntry>> {
        let mut buckets: BTreeMap<u32, Vec<&ScheduledEntry>> = BTreeMap::new();
        for entry in &self.entries {
            buckets
                .entry(entry.occurrence.start_hour())
                .or_default()
                .push(entry);
        }
        buckets
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn status_on(template: &TaskTemplate, occurrence: &Occurrence, state: &SessionState) -> TaskStatus {
    if state
        .active
        .as_ref()
        .is_some_and(|active| active.occurrence_key() == occurrence.key)
    {
        return TaskStatus::InProgress;
    }
    if !template.is_recurring() {
        return template.status;
    }
    if state.is_completed(&occurrence.key) {
        TaskStatus::Completed
    } else {
        TaskStatus::Pending
    }
}
