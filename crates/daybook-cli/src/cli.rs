use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use daybook_core::{
    recurrence::{Recurrence, RecurrencePattern, WeekDay},
    tasks::{Category, Priority},
};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "daybook",
    about = "Local-first daily planner with recurring tasks and a focus timer",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to launching the TUI when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Launch the interactive timeline (press q or Esc to exit).
    Tui {
        /// Day to open on; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print version and exit.
    Version,
    /// Add a task template.
    Add(AddArgs),
    /// Change fields of a task template.
    Edit(EditArgs),
    /// Delete a task template.
    #[command(visible_alias = "rm")]
    Delete { id: String },
    /// List every template in the pool.
    List,
    /// Show what happens on a day, as a grid or an hourly timeline.
    Day {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },
    /// List the dated occurrences of one template.
    Occurrences {
        id: String,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Start the timer on a pending task (today's occurrence).
    Start { id: String },
    /// Stop the timer without completing; elapsed time is dropped.
    Pause { id: String },
    /// Complete the running task.
    Done { id: String },
    /// Show the running timer, if any.
    Status,
    /// Totals for the current session.
    Summary,
    /// Archive the current session into history.
    EndSession,
    /// Archived sessions, most recent first.
    History {
        #[arg(long, default_value_t = 7)]
        limit: usize,
    },
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    pub name: String,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Day of the task, or the first day of a recurring one; defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_time)]
    pub start: NaiveTime,
    #[arg(long, value_parser = parse_time)]
    pub end: NaiveTime,
    #[arg(long, value_enum, default_value_t = CategoryArg::Work)]
    pub category: CategoryArg,
    #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
    pub priority: PriorityArg,
    #[command(flatten)]
    pub repeat: RepeatArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_time)]
    pub start: Option<NaiveTime>,
    #[arg(long, value_parser = parse_time)]
    pub end: Option<NaiveTime>,
    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,
    #[command(flatten)]
    pub repeat: RepeatArgs,
    /// Turn the template back into a one-off task.
    #[arg(long, conflicts_with_all = ["repeat", "until"])]
    pub no_repeat: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RepeatArgs {
    #[arg(long, value_enum)]
    pub repeat: Option<RepeatArg>,
    /// Weekdays for `--repeat weekly`, e.g. `mon,wed`.
    #[arg(long, value_delimiter = ',', requires = "repeat")]
    pub on: Vec<WeekDay>,
    /// Last day of a recurring task.
    #[arg(long)]
    pub until: Option<NaiveDate>,
}

impl RepeatArgs {
    pub fn recurrence(&self) -> Option<Recurrence> {
        self.repeat.map(|pattern| Recurrence {
            pattern: pattern.into(),
            week_days: self.on.iter().copied().collect(),
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    Work,
    Personal,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Work => Category::Work,
            CategoryArg::Personal => Category::Personal,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatArg {
    Daily,
    Weekly,
    Weekdays,
    Weekends,
}

impl From<RepeatArg> for RecurrencePattern {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Daily => RecurrencePattern::Daily,
            RepeatArg::Weekly => RecurrencePattern::Weekly,
            RepeatArg::Weekdays => RecurrencePattern::Weekdays,
            RepeatArg::Weekends => RecurrencePattern::Weekends,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewArg {
    Grid,
    Timeline,
}

/// Accepts `HH:MM` or `HH:MM:SS`.
fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}
