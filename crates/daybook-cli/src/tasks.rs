use std::io::Write;

use chrono::{Local, NaiveDate};
use color_eyre::{eyre::bail, Result};
use daybook_core::{
    schedule::{DaySchedule, ScheduledEntry},
    session::{format_duration, CompletedTask, HistoryArchive, SessionStore},
    tasks::{Category, NewTask, Priority, TaskPatch, TaskStatus, TaskStore, TaskTemplate},
    Tracker,
};
use uuid::Uuid;

use crate::{
    cli::{AddArgs, Command, EditArgs, ViewArg},
    config::DayView,
};

/// Execute a planner subcommand against `tracker`, writing human output to `out`.
pub async fn run<T, H, S>(
    tracker: &Tracker<T, H, S>,
    cmd: Command,
    default_view: DayView,
    out: &mut dyn Write,
) -> Result<()>
where
    T: TaskStore,
    H: HistoryArchive,
    S: SessionStore,
{
    match cmd {
        Command::Add(args) => {
            let task = tracker.create(new_task(args, tracker.clock().today())).await?;
            writeln!(out, "Created task {}: {}", short_id(task.id), task.name)?;
        }
        Command::Edit(args) => {
            let id = resolve_id(tracker, &args.id).await?;
            let patch = edit_patch(args);
            if patch.is_empty() {
                writeln!(out, "Nothing to change.")?;
                return Ok(());
            }
            let task = tracker.edit(id, patch).await?;
            writeln!(out, "Updated task {}: {}", short_id(task.id), task.name)?;
        }
        Command::Delete { id } => {
            let id = resolve_id(tracker, &id).await?;
            tracker.delete(id).await?;
            writeln!(out, "Deleted task {}", short_id(id))?;
        }
        Command::List => {
            let tasks = tracker.list().await?;
            if tasks.is_empty() {
                writeln!(
                    out,
                    "No tasks yet. Add one with `daybook add <name> --start HH:MM --end HH:MM`."
                )?;
                return Ok(());
            }
            for task in &tasks {
                write_template(out, task)?;
            }
        }
        Command::Day { date, view } => {
            let date = date.unwrap_or_else(|| tracker.clock().today());
            let schedule = tracker.schedule_for(date).await?;
            let view = match view {
                Some(ViewArg::Grid) => DayView::Grid,
                Some(ViewArg::Timeline) => DayView::Timeline,
                None => default_view,
            };
            write_schedule(out, &schedule, view)?;
        }
        Command::Occurrences { id, from, to } => {
            let id = resolve_id(tracker, &id).await?;
            let occurrences = tracker.occurrences(id, from.zip(to)).await?;
            if occurrences.is_empty() {
                writeln!(out, "No occurrences in that range.")?;
            }
            for occurrence in occurrences {
                writeln!(
                    out,
                    "{} {}  {}",
                    occurrence.start_at.format("%a %Y-%m-%d %H:%M"),
                    occurrence.end_at.format("- %H:%M"),
                    occurrence.key
                )?;
            }
        }
        Command::Start { id } => {
            let id = resolve_id(tracker, &id).await?;
            let session = tracker.start(id).await?;
            writeln!(
                out,
                "Started {} at {}",
                session.task.name,
                session.started_at.with_timezone(&Local).format("%H:%M")
            )?;
        }
        Command::Pause { id } => {
            let id = resolve_id(tracker, &id).await?;
            let task = tracker.pause(id).await?;
            writeln!(out, "Paused {}; its timer was reset.", task.name)?;
        }
        Command::Done { id } => {
            let id = resolve_id(tracker, &id).await?;
            let record = tracker.complete(id).await?;
            writeln!(
                out,
                "Completed {} in {}",
                record.task.name,
                format_duration(record.duration)
            )?;
        }
        Command::Status => match tracker.elapsed().await? {
            Some((session, secs)) => writeln!(
                out,
                "Running: {} ({}) for {}",
                session.task.name,
                short_id(session.task.id),
                format_duration(secs)
            )?,
            None => writeln!(out, "No timer running.")?,
        },
        Command::Summary => {
            let summary = tracker.summary().await?;
            writeln!(
                out,
                "Tasks: {}  Completed: {}  Time: {}",
                summary.total_tasks,
                summary.total_completed,
                format_duration(summary.total_duration)
            )?;
            write_completed(out, &tracker.completed().await?)?;
        }
        Command::EndSession => {
            let ended = tracker.end_session().await?;
            writeln!(
                out,
                "Archived {}: {} of {} tasks completed, {} tracked.",
                ended.entry.date,
                ended.summary.total_completed,
                ended.summary.total_tasks,
                format_duration(ended.summary.total_duration)
            )?;
            write_completed(out, &ended.entry.completed_tasks)?;
        }
        Command::History { limit } => {
            let history = tracker.history().await?;
            if history.is_empty() {
                writeln!(out, "No sessions archived yet.")?;
            }
            for entry in history.iter().take(limit) {
                let summary = entry.summary();
                writeln!(
                    out,
                    "{}  {}/{} completed  {}",
                    entry.date,
                    summary.total_completed,
                    summary.total_tasks,
                    format_duration(summary.total_duration)
                )?;
                for done in &entry.completed_tasks {
                    writeln!(
                        out,
                        "    {} ({})",
                        done.task.name,
                        format_duration(done.duration)
                    )?;
                }
            }
        }
        Command::Tui { .. } | Command::Version | Command::Config(_) => {
            bail!("not a planner command")
        }
    }

    Ok(())
}

fn new_task(args: AddArgs, today: NaiveDate) -> NewTask {
    NewTask {
        recurrence: args.repeat.recurrence(),
        end_date: args.repeat.until,
        name: args.name,
        description: args.description,
        category: args.category.into(),
        priority: args.priority.into(),
        date: args.date.unwrap_or(today),
        start_time: args.start,
        end_time: args.end,
    }
}

fn edit_patch(args: EditArgs) -> TaskPatch {
    let (end_date, recurrence) = if args.no_repeat {
        (Some(None), Some(None))
    } else {
        (
            args.repeat.until.map(Some),
            args.repeat.recurrence().map(Some),
        )
    };
    TaskPatch {
        name: args.name,
        description: if args.clear_description {
            Some(None)
        } else {
            args.description.map(Some)
        },
        category: args.category.map(Into::into),
        priority: args.priority.map(Into::into),
        date: args.date,
        start_time: args.start,
        end_time: args.end,
        end_date,
        recurrence,
        status: None,
    }
}

/// Full UUIDs, or any unambiguous prefix of one.
async fn resolve_id<T, H, S>(tracker: &Tracker<T, H, S>, raw: &str) -> Result<Uuid>
where
    T: TaskStore,
    H: HistoryArchive,
    S: SessionStore,
{
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }
    let needle = raw.trim().to_ascii_lowercase();
    if needle.is_empty() {
        bail!("task id is empty");
    }
    let matches: Vec<Uuid> = tracker
        .list()
        .await?
        .into_iter()
        .map(|t| t.id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no task matches '{raw}'"),
        _ => bail!("'{raw}' matches {} tasks; give more of the id", matches.len()),
    }
}

fn write_template(out: &mut dyn Write, task: &TaskTemplate) -> Result<()> {
    write!(
        out,
        "{} {} {}-{} {} {}  ({}, {})",
        short_id(task.id),
        task.date,
        task.start_time.format("%H:%M"),
        task.end_time.format("%H:%M"),
        status_label(task.status),
        task.name,
        category_label(task.category),
        priority_label(task.priority)
    )?;
    if let Some((rule, end_date)) = task.recurring_window() {
        write!(out, "  {} until {end_date}", rule.describe())?;
    }
    writeln!(out)?;
    if let Some(desc) = &task.description {
        writeln!(out, "    {desc}")?;
    }
    Ok(())
}

fn write_schedule(out: &mut dyn Write, schedule: &DaySchedule, view: DayView) -> Result<()> {
    writeln!(out, "{}", schedule.date.format("%A %Y-%m-%d"))?;
    if schedule.is_empty() {
        writeln!(out, "Nothing scheduled.")?;
        return Ok(());
    }
    match view {
        DayView::Grid => {
            for entry in schedule.grid() {
                writeln!(out, "  {}", entry_line(entry))?;
            }
        }
        DayView::Timeline => {
            for (hour, entries) in schedule.timeline() {
                writeln!(out, "{hour:02}:00")?;
                for entry in entries {
                    writeln!(out, "  | {}", entry_line(entry))?;
                }
            }
        }
    }
    Ok(())
}

/// One line per finished timer, newest first.
fn write_completed(out: &mut dyn Write, completed: &[CompletedTask]) -> Result<()> {
    for done in completed {
        writeln!(
            out,
            "  {}  {}  {}",
            done.task.name,
            worked_span(done),
            format_duration(done.duration)
        )?;
    }
    Ok(())
}

/// Local wall-clock `HH:MM-HH:MM` of a finished timer.
pub(crate) fn worked_span(done: &CompletedTask) -> String {
    format!(
        "{}-{}",
        done.started_at.with_timezone(&Local).format("%H:%M"),
        done.completed_at.with_timezone(&Local).format("%H:%M")
    )
}

fn entry_line(entry: &ScheduledEntry) -> String {
    let task = &entry.occurrence.task;
    let mut line = format!(
        "{}-{} {} {}  ({}, {}) #{}",
        entry.occurrence.start_at.format("%H:%M"),
        entry.occurrence.end_at.format("%H:%M"),
        status_label(entry.status),
        task.name,
        category_label(task.category),
        priority_label(task.priority),
        short_id(task.id)
    );
    if entry.recurring {
        line.push_str(" (repeats)");
    }
    line
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

pub(crate) fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "[todo]",
        TaskStatus::InProgress => "[doing]",
        TaskStatus::Completed => "[done]",
    }
}

fn category_label(category: Category) -> &'static str {
    match category {
        Category::Work => "work",
        Category::Personal => "personal",
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use clap::Parser;
    use daybook_core::{
        clock::ManualClock,
        ids::SequentialIds,
        memory::{InMemoryHistoryArchive, InMemorySessionStore, InMemoryTaskStore},
    };

    use super::*;
    use crate::cli::Cli;

    type TestTracker = Tracker<InMemoryTaskStore, InMemoryHistoryArchive, InMemorySessionStore>;

    fn tracker(clock: &ManualClock) -> TestTracker {
        Tracker::new(
            InMemoryTaskStore::new(),
            InMemoryHistoryArchive::new(),
            InMemorySessionStore::new(),
        )
        .with_clock(clock.clone())
        .with_ids(SequentialIds::new())
    }

    fn clock(at: &str) -> ManualClock {
        ManualClock::new(at.parse::<DateTime<Utc>>().expect("timestamp"))
    }

    fn local_span(from: &str, to: &str) -> String {
        let local = |at: &str| {
            at.parse::<DateTime<Utc>>()
                .expect("timestamp")
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string()
        };
        format!("{}-{}", local(from), local(to))
    }

    async fn exec(tracker: &TestTracker, args: &[&str]) -> Result<String> {
        let argv = std::iter::once("daybook").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv)?;
        let Some(cmd) = cli.command else {
            bail!("missing command");
        };
        let mut out = Vec::new();
        run(tracker, cmd, DayView::Grid, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn add_then_show_the_day() {
        let clock = clock("2024-06-03T08:00:00Z");
        let tracker = tracker(&clock);

        let created = exec(
            &tracker,
            &["add", "Write report", "--start", "09:00", "--end", "10:00", "--priority", "high"],
        )
        .await
        .expect("add");
        assert_eq!(created, "Created task 00000000: Write report\n");

        let grid = exec(&tracker, &["day"]).await.expect("day");
        assert!(grid.starts_with("Monday 2024-06-03\n"));
        assert!(grid.contains("09:00-10:00 [todo] Write report  (work, high)"));

        let timeline = exec(&tracker, &["day", "--view", "timeline"])
            .await
            .expect("timeline");
        assert!(timeline.contains("09:00\n  | 09:00-10:00"));

        let tomorrow = exec(&tracker, &["day", "--date", "2024-06-04"])
            .await
            .expect("tomorrow");
        assert!(tomorrow.contains("Nothing scheduled."));
    }

    #[tokio::test]
    async fn timer_flow_reports_duration() {
        let clock = clock("2024-06-03T09:05:00Z");
        let tracker = tracker(&clock);
        exec(&tracker, &["add", "Write report", "--start", "09:00", "--end", "10:00"])
            .await
            .expect("add");
        let id = Uuid::from_u128(1).to_string();

        exec(&tracker, &["start", &id]).await.expect("start");
        clock.advance(Duration::minutes(30));
        let status = exec(&tracker, &["status"]).await.expect("status");
        assert_eq!(status, "Running: Write report (00000000) for 30m\n");

        let done = exec(&tracker, &["done", &id]).await.expect("done");
        assert_eq!(done, "Completed Write report in 30m\n");

        let worked = local_span("2024-06-03T09:05:00Z", "2024-06-03T09:35:00Z");
        let summary = exec(&tracker, &["summary"]).await.expect("summary");
        assert_eq!(
            summary,
            format!("Tasks: 1  Completed: 1  Time: 30m\n  Write report  {worked}  30m\n")
        );
        let list = exec(&tracker, &["list"]).await.expect("list");
        assert!(list.starts_with("No tasks yet."));

        let ended = exec(&tracker, &["end-session"]).await.expect("end");
        assert_eq!(
            ended,
            format!(
                "Archived 2024-06-03: 1 of 1 tasks completed, 30m tracked.\n  Write report  {worked}  30m\n"
            )
        );
        let history = exec(&tracker, &["history"]).await.expect("history");
        assert!(history.contains("2024-06-03  1/1 completed  30m"));
        assert!(history.contains("    Write report (30m)"));
    }

    #[tokio::test]
    async fn recurring_tasks_list_occurrences() {
        let clock = clock("2024-06-03T08:00:00Z");
        let tracker = tracker(&clock);
        exec(
            &tracker,
            &[
                "add", "Planning", "--start", "09:00", "--end", "09:30", "--repeat", "weekly",
                "--on", "mon", "--until", "2024-06-17",
            ],
        )
        .await
        .expect("add");
        let id = Uuid::from_u128(1).to_string();

        let all = exec(&tracker, &["occurrences", &id]).await.expect("occurrences");
        assert_eq!(all.lines().count(), 3);
        assert!(all.contains(&format!("{id}-2024-06-10")));

        let list = exec(&tracker, &["list"]).await.expect("list");
        assert!(list.contains("Weekly (Mon) until 2024-06-17"));

        let tuesday = exec(&tracker, &["day", "--date", "2024-06-04"])
            .await
            .expect("tuesday");
        assert!(tuesday.contains("Nothing scheduled."));
    }

    #[tokio::test]
    async fn edit_and_delete() {
        let clock = clock("2024-06-03T08:00:00Z");
        let tracker = tracker(&clock);
        exec(
            &tracker,
            &["add", "Gym", "--start", "18:00", "--end", "19:00", "-d", "legs"],
        )
        .await
        .expect("add");
        let id = Uuid::from_u128(1).to_string();

        let nothing = exec(&tracker, &["edit", &id]).await.expect("no-op edit");
        assert_eq!(nothing, "Nothing to change.\n");

        exec(
            &tracker,
            &["edit", &id, "--category", "personal", "--clear-description"],
        )
        .await
        .expect("edit");
        let task = tracker.get(Uuid::from_u128(1)).await.expect("get");
        assert_eq!(task.category, Category::Personal);
        assert_eq!(task.description, None);

        let bad = exec(&tracker, &["edit", &id, "--end", "17:00"]).await;
        assert!(bad.is_err());

        exec(&tracker, &["rm", &id]).await.expect("delete");
        assert!(exec(&tracker, &["rm", &id]).await.is_err());
    }

    #[tokio::test]
    async fn ids_resolve_by_unique_prefix() {
        let clock = clock("2024-06-03T08:00:00Z");
        let tracker = tracker(&clock);
        for name in ["A", "B"] {
            exec(&tracker, &["add", name, "--start", "09:00", "--end", "10:00"])
                .await
                .expect("add");
        }

        let ambiguous = resolve_id(&tracker, "00000000").await.expect_err("two matches");
        assert!(ambiguous.to_string().contains("matches 2 tasks"));
        assert!(resolve_id(&tracker, "ffff").await.is_err());
        assert_eq!(
            resolve_id(&tracker, "00000000-0000-0000-0000-000000000002")
                .await
                .expect("full id"),
            Uuid::from_u128(2)
        );
    }

    #[tokio::test]
    async fn summary_lists_completions_newest_first() {
        let clock = clock("2024-06-03T09:00:00Z");
        let tracker = tracker(&clock);
        for name in ["Inbox", "Standup"] {
            exec(&tracker, &["add", name, "--start", "09:00", "--end", "10:00"])
                .await
                .expect("add");
        }

        let empty = exec(&tracker, &["summary"]).await.expect("summary");
        assert_eq!(empty, "Tasks: 2  Completed: 0  Time: 0s\n");

        for id in [Uuid::from_u128(1), Uuid::from_u128(2)] {
            let id = id.to_string();
            exec(&tracker, &["start", &id]).await.expect("start");
            clock.advance(Duration::minutes(15));
            exec(&tracker, &["done", &id]).await.expect("done");
        }

        let summary = exec(&tracker, &["summary"]).await.expect("summary");
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines[0], "Tasks: 2  Completed: 2  Time: 30m");
        assert_eq!(
            lines[1],
            format!(
                "  Standup  {}  15m",
                local_span("2024-06-03T09:15:00Z", "2024-06-03T09:30:00Z")
            )
        );
        assert_eq!(
            lines[2],
            format!(
                "  Inbox  {}  15m",
                local_span("2024-06-03T09:00:00Z", "2024-06-03T09:15:00Z")
            )
        );
    }
}
