//! `eduvault` command-line host.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open the configured store.
//! - Expose task CRUD, the calendar grid, study stats and the live session
//!   clock as subcommands.
//!
//! # Invariants
//! - Core crate types are the only source of task semantics; this binary
//!   only parses arguments and renders results.

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use eduvault_core::db::open_db;
use eduvault_core::model::task::parse_date;
use eduvault_core::{
    init_logging, load_config, AppConfig, CalendarMonth, Clock, ClockEvent, ClockLoop,
    JsonTaskStore, Notification, NotificationCenter, Notifier, Planner, Priority,
    SqliteTaskRepository, StopHandle, StorageConfig, StudyStats, SystemClock, TaskDraft, TaskId,
    TaskRepository, TaskService, TickReport,
};
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(author, version, about = "EduVault study planner")]
struct Cli {
    /// JSON config file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "eduvault.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule a new study task.
    Add {
        title: String,
        /// Start time, `HH:MM` (24-hour).
        #[arg(short, long)]
        time: String,
        /// `YYYY-MM-DD`; defaults to today.
        #[arg(short, long)]
        date: Option<String>,
        /// Focus session length in minutes.
        #[arg(short = 'm', long, default_value_t = 25)]
        duration: u32,
        #[arg(short, long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
    },
    /// List tasks in start order.
    List {
        /// Only tasks on this `YYYY-MM-DD` date.
        #[arg(short, long)]
        date: Option<String>,
        /// Hide completed tasks.
        #[arg(long)]
        pending: bool,
    },
    /// Flip a task's completion flag.
    Toggle { id: TaskId },
    /// Delete a task.
    Delete { id: TaskId },
    /// Print a month grid; days with tasks are marked.
    Calendar {
        /// `YYYY-MM`; defaults to the current month.
        month: Option<String>,
    },
    /// Print study statistics.
    Stats,
    /// Run the session clock in the foreground.
    Watch {
        /// Stop after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

/// Prints notifications as they arrive and keeps a bounded history.
struct ConsoleNotifier {
    history: NotificationCenter,
}

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, notification: Notification) {
        info!(
            "event=notify module=cli status=ok kind={} title={:?}",
            notification.kind.as_str(),
            notification.title
        );
        println!(
            "[{}] {}: {}",
            notification.kind.as_str(),
            notification.title,
            notification.message
        );
        self.history.notify(notification);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli.config)?;
    init_logging(&config.logging)?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        eduvault_core::core_version()
    );

    match &config.storage {
        StorageConfig::Local { path } => execute(JsonTaskStore::new(path), cli.command, &config),
        StorageConfig::Hosted { db_path, user_id } => {
            let conn = open_db(db_path)?;
            let repo = SqliteTaskRepository::try_new(&conn, user_id.as_str())?;
            execute(repo, cli.command, &config)
        }
    }
}

fn execute<R: TaskRepository>(repo: R, command: Command, config: &AppConfig) -> CliResult<()> {
    let now = SystemClock.now();
    let notifier = ConsoleNotifier {
        history: NotificationCenter::new(config.planner.notification_capacity),
    };
    let mut service = TaskService::load(repo, notifier, config.planner.retry, now)?;

    match command {
        Command::Add {
            title,
            time,
            date,
            duration,
            priority,
        } => {
            let draft = TaskDraft {
                title,
                date: date.unwrap_or_else(|| now.date().format("%Y-%m-%d").to_string()),
                time,
                duration_minutes: duration,
                priority,
            };
            let task = service.create_task(draft, now)?;
            println!("{}", task.id);
        }
        Command::List { date, pending } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            for task in service.board().tasks().iter().filter(|task| {
                date.map_or(true, |date| task.date == date) && !(pending && task.completed)
            }) {
                println!(
                    "{} [{}] {} {} {:>4}m {:<6} {}",
                    task.id,
                    if task.completed { "x" } else { " " },
                    task.date_label(),
                    task.time_label(),
                    task.duration_minutes,
                    task.priority.as_str(),
                    task.title
                );
            }
        }
        Command::Toggle { id } => {
            let task = service.toggle_complete(id, now)?;
            println!(
                "{} is now {}",
                task.title,
                if task.completed { "complete" } else { "pending" }
            );
        }
        Command::Delete { id } => {
            let task = service.delete_task(id, now)?;
            println!("deleted {}", task.title);
        }
        Command::Calendar { month } => {
            let month = match month {
                Some(value) => parse_month(&value)?,
                None => CalendarMonth::containing(now.date()),
            };
            print_calendar(&month, |day| service.board().on_date(day).next().is_some());
        }
        Command::Stats => print_stats(&StudyStats::compute(service.board().tasks(), now.date())),
        Command::Watch { max_ticks } => {
            let mut planner = Planner::new(service, &config.planner);
            let mut ticker = ClockLoop::new(SystemClock, config.planner.tick_interval());
            if let Some(max_ticks) = max_ticks {
                ticker = ticker.with_max_ticks(max_ticks);
            }
            register_stop_signals(&ticker.stop_handle())?;
            let ticks = ticker.run(&mut planner, print_tick);
            service = planner.into_service();
            println!(
                "stopped after {ticks} tick(s); {} notification(s) this session",
                service.notifier().history.len()
            );
        }
    }

    let pending = service.pending_changes().len();
    if pending > 0 {
        eprintln!("warning: {pending} change(s) could not be saved");
    }
    Ok(())
}

/// Ends the loop on Ctrl-C or SIGTERM so the pending-write summary still prints.
fn register_stop_signals(stop: &StopHandle) -> CliResult<()> {
    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(stop.flag()))?;
    }
    Ok(())
}

fn print_tick(report: &TickReport) {
    for event in &report.events {
        match event {
            ClockEvent::SessionCompleted { title, .. } => println!("session finished: {title}"),
            ClockEvent::SessionAborted { task_id, reason } => {
                println!("session for {task_id} stopped: {reason:?}")
            }
            ClockEvent::SessionStarted { .. } | ClockEvent::SessionQueued { .. } => {}
        }
    }
    if let Some(active) = &report.active {
        if active.seconds_remaining % 60 == 0 {
            println!(
                "{} {:02}:{:02} left",
                active.title,
                active.seconds_remaining / 60,
                active.seconds_remaining % 60
            );
        }
    }
}

fn print_calendar(month: &CalendarMonth, has_tasks: impl Fn(NaiveDate) -> bool) {
    println!("{:^28}", month.label());
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");
    for week in month.weeks() {
        let row: String = week
            .iter()
            .map(|cell| match cell {
                Some(day) => {
                    let marker = if has_tasks(*day) { '*' } else { ' ' };
                    format!("{:>3}{marker}", day.day())
                }
                None => "    ".to_string(),
            })
            .collect();
        println!("{}", row.trim_end());
    }
}

fn print_stats(stats: &StudyStats) {
    println!(
        "tasks:          {} ({} done, {} pending)",
        stats.total, stats.completed, stats.pending
    );
    println!("completion:     {}%", stats.completion_rate);
    println!("focus minutes:  {}", stats.focus_minutes);
    println!("today:          {}/{} done", stats.today_completed, stats.today_total);
    println!("high priority:  {} pending", stats.high_priority_pending);
    println!("streak:         {} day(s)", stats.streak_days);
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    Priority::parse(value)
        .ok_or_else(|| format!("unknown priority `{value}`; use low, medium or high"))
}

fn parse_month(value: &str) -> CliResult<CalendarMonth> {
    let (year, month) = value
        .split_once('-')
        .ok_or_else(|| format!("invalid month `{value}`; expected YYYY-MM"))?;
    let year: i32 = year.trim().parse()?;
    let month: u32 = month.trim().parse()?;
    Ok(CalendarMonth::new(year, month)?)
}
