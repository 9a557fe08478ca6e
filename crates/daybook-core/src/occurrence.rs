//! Expansion of templates into dated occurrences and the shared per-date
//! selection policy.
//!
//! Occurrences are plain values recomputed from their template every time;
//! they are never stored. Their keys are derived from the template id and
//! the occurrence day, so the same occurrence always gets the same key.

use std::{cmp, fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasks::TaskTemplate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Derived identifier of an occurrence: `{task_id}` for a one-off task,
/// `{task_id}-{YYYY-MM-DD}` for a day of a recurring one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OccurrenceKey {
    pub task_id: Uuid,
    pub date: Option<NaiveDate>,
}

impl OccurrenceKey {
    pub fn sole(task_id: Uuid) -> Self {
        Self {
            task_id,
            date: None,
        }
    }

    pub fn dated(task_id: Uuid, date: NaiveDate) -> Self {
        Self {
            task_id,
            date: Some(date),
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "{}-{}", self.task_id, date.format(DATE_FORMAT)),
            None => write!(f, "{}", self.task_id),
        }
    }
}

impl FromStr for OccurrenceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Hyphenated UUIDs are always 36 ASCII characters.
        let (id, rest) = s
            .split_at_checked(36)
            .ok_or_else(|| format!("invalid occurrence key '{s}'"))?;
        let task_id = Uuid::parse_str(id).map_err(|e| format!("invalid occurrence key '{s}': {e}"))?;
        if rest.is_empty() {
            return Ok(Self::sole(task_id));
        }
        let date = rest
            .strip_prefix('-')
            .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
            .ok_or_else(|| format!("invalid occurrence date in key '{s}'"))?;
        Ok(Self::dated(task_id, date))
    }
}

impl TryFrom<String> for OccurrenceKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OccurrenceKey> for String {
    fn from(key: OccurrenceKey) -> Self {
        key.to_string()
    }
}

/// A template placed on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub key: OccurrenceKey,
    /// Template fields, with `date` set to the occurrence day.
    pub task: TaskTemplate,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

impl Occurrence {
    /// The template as its own only occurrence.
    pub fn sole(template: &TaskTemplate) -> Self {
        Self {
            key: OccurrenceKey::sole(template.id),
            task: template.clone(),
            start_at: template.start_at(),
            end_at: template.end_at(),
        }
    }

    pub fn on(template: &TaskTemplate, date: NaiveDate) -> Self {
        let mut task = template.clone();
        task.date = date;
        Self {
            key: OccurrenceKey::dated(template.id, date),
            start_at: date.and_time(template.start_time),
            end_at: date.and_time(template.end_time),
            task,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.task.date
    }

    /// Hour-of-day bucket used by the timeline.
    pub fn start_hour(&self) -> u32 {
        self.start_at.hour()
    }
}

/// Every occurrence of `template` over `[date, end_date]`.
///
/// Templates without a recurrence or end date are their own sole occurrence.
/// Prefer [`materialize_between`] when only a window is displayed.
pub fn materialize(template: &TaskTemplate) -> Vec<Occurrence> {
    match template.recurring_window() {
        Some((_, end_date)) => materialize_between(template, template.date, end_date),
        None => vec![Occurrence::sole(template)],
    }
}

/// Occurrences of `template` that fall inside `[from, to]`, in date order.
pub fn materialize_between(template: &TaskTemplate, from: NaiveDate, to: NaiveDate) -> Vec<Occurrence> {
    let Some((rule, end_date)) = template.recurring_window() else {
        return if from <= template.date && template.date <= to {
            vec![Occurrence::sole(template)]
        } else {
            Vec::new()
        };
    };

    let first = cmp::max(from, template.date);
    let last = cmp::min(to, end_date);
    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| rule.includes(*day))
        .map(|day| Occurrence::on(template, day))
        .collect()
}

/// The occurrence of `template` on `date`, if it has one.
pub fn occurrence_on(template: &TaskTemplate, date: NaiveDate) -> Option<Occurrence> {
    match template.recurring_window() {
        Some((rule, end_date)) => (template.date <= date && date <= end_date && rule.includes(date))
            .then(|| Occurrence::on(template, date)),
        None => (template.date == date).then(|| Occurrence::sole(template)),
    }
}

/// Templates visible on `target`, paired with their occurrence, in pool order.
///
/// This is the only visibility policy; the grid and the timeline are both
/// projections of its result.
pub fn select_for_date(pool: &[TaskTemplate], target: NaiveDate) -> Vec<(&TaskTemplate, Occurrence)> {
    pool.iter()
        .filter_map(|template| occurrence_on(template, target).map(|occ| (template, occ)))
        .collect()
}
