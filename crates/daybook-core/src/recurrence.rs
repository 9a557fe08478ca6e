use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Day of the week as stored on a recurrence rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeekDay {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl WeekDay {
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, WeekDay::Sat | WeekDay::Sun)
    }

    pub fn label(self) -> &'static str {
        match self {
            WeekDay::Mon => "Mon",
            WeekDay::Tue => "Tue",
            WeekDay::Wed => "Wed",
            WeekDay::Thu => "Thu",
            WeekDay::Fri => "Fri",
            WeekDay::Sat => "Sat",
            WeekDay::Sun => "Sun",
        }
    }
}

impl From<Weekday> for WeekDay {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => WeekDay::Mon,
            Weekday::Tue => WeekDay::Tue,
            Weekday::Wed => WeekDay::Wed,
            Weekday::Thu => WeekDay::Thu,
            Weekday::Fri => WeekDay::Fri,
            Weekday::Sat => WeekDay::Sat,
            Weekday::Sun => WeekDay::Sun,
        }
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WeekDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(WeekDay::Mon),
            "tue" | "tuesday" => Ok(WeekDay::Tue),
            "wed" | "wednesday" => Ok(WeekDay::Wed),
            "thu" | "thursday" => Ok(WeekDay::Thu),
            "fri" | "friday" => Ok(WeekDay::Fri),
            "sat" | "saturday" => Ok(WeekDay::Sat),
            "sun" | "sunday" => Ok(WeekDay::Sun),
            other => Err(format!("unknown weekday '{other}'")),
        }
    }
}

/// Rule deciding which calendar days a recurring task occurs on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Weekdays,
    Weekends,
    /// Any pattern name this build does not know (e.g. `"None"`); never occurs.
    #[serde(other)]
    Unknown,
}

impl RecurrencePattern {
    pub fn label(self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "Daily",
            RecurrencePattern::Weekly => "Weekly",
            RecurrencePattern::Weekdays => "Weekdays",
            RecurrencePattern::Weekends => "Weekends",
            RecurrencePattern::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "weekdays" => Ok(RecurrencePattern::Weekdays),
            "weekends" => Ok(RecurrencePattern::Weekends),
            other => Err(format!(
                "unknown recurrence '{other}' (expected daily, weekly, weekdays or weekends)"
            )),
        }
    }
}

/// Recurrence attached to a task template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    /// Only meaningful for `Weekly`.
    #[serde(default)]
    pub week_days: BTreeSet<WeekDay>,
}

impl Recurrence {
    pub fn new(pattern: RecurrencePattern) -> Self {
        Self {
            pattern,
            week_days: BTreeSet::new(),
        }
    }

    pub fn weekly(days: impl IntoIterator<Item = WeekDay>) -> Self {
        Self {
            pattern: RecurrencePattern::Weekly,
            week_days: days.into_iter().collect(),
        }
    }

    pub fn includes(&self, date: NaiveDate) -> bool {
        includes(date, self.pattern, &self.week_days)
    }

    /// Short label for list views, e.g. `Weekly (Mon, Wed)`.
    pub fn describe(&self) -> String {
        if self.pattern == RecurrencePattern::Weekly {
            let days: Vec<&str> = self.week_days.iter().map(|d| d.label()).collect();
            format!("Weekly ({})", days.join(", "))
        } else {
            self.pattern.label().to_string()
        }
    }
}

/// Whether `date` is an occurrence day under `pattern`.
///
/// Total over its inputs: a `Weekly` rule with no days and an unknown
/// pattern both simply never match.
pub fn includes(date: NaiveDate, pattern: RecurrencePattern, week_days: &BTreeSet<WeekDay>) -> bool {
    let day = WeekDay::of(date);
    match pattern {
        RecurrencePattern::Daily => true,
        RecurrencePattern::Weekdays => !day.is_weekend(),
        RecurrencePattern::Weekends => day.is_weekend(),
        RecurrencePattern::Weekly => week_days.contains(&day),
        RecurrencePattern::Unknown => false,
    }
}
