use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use habit_core::{
    calendar::CalendarMonth,
    clock::{FixedClock, LocalClock},
    habit::HabitId,
    ledger::{parse_date_key, PresencePolicy},
    notifications::{ChangeObserver, TrackerChange},
    weekly::WeeklyPolicy,
    HabitService, TrackerError,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub(crate) today: Option<NaiveDate>,
    pub(crate) presence_policy: PresencePolicy,
    pub(crate) weekly_policy: WeeklyPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Reads settings through `lookup`. Unparseable values are logged and
    /// skipped, so one bad variable never discards the others.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("HABIT_TODAY") {
            match parse_date_key(&raw) {
                Ok(date) => {
                    info!(%date, "using fixed date");
                    config.today = Some(date);
                }
                Err(err) => warn!(%err, value = %raw, "ignoring invalid HABIT_TODAY"),
            }
        }
        if let Some(raw) = lookup("HABIT_PRESENCE_POLICY") {
            match parse_presence_policy(&raw) {
                Some(policy) => config.presence_policy = policy,
                None => warn!(value = %raw, "ignoring unknown presence policy"),
            }
        }
        if let Some(raw) = lookup("HABIT_WEEKLY_POLICY") {
            match parse_weekly_policy(&raw) {
                Some(policy) => config.weekly_policy = policy,
                None => warn!(value = %raw, "ignoring unknown weekly policy"),
            }
        }
        config
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_presence_policy(mut self, policy: PresencePolicy) -> Self {
        self.presence_policy = policy;
        self
    }

    pub fn with_weekly_policy(mut self, policy: WeeklyPolicy) -> Self {
        self.weekly_policy = policy;
        self
    }
}

fn parse_presence_policy(raw: &str) -> Option<PresencePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "unconditional" => Some(PresencePolicy::Unconditional),
        "counted" => Some(PresencePolicy::Counted),
        _ => None,
    }
}

fn parse_weekly_policy(raw: &str) -> Option<WeeklyPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "scan" => Some(WeeklyPolicy::Scan),
        "grouped" => Some(WeeklyPolicy::Grouped),
        _ => None,
    }
}

/// Raised by the service after every applied mutation and by status
/// updates; cleared once the screen has been redrawn.
#[derive(Clone, Default)]
struct RenderSignal(Arc<AtomicBool>);

impl RenderSignal {
    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl ChangeObserver for RenderSignal {
    fn on_change(&self, change: &TrackerChange) {
        debug!(?change, "state changed");
        self.raise();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HabitRow {
    pub number: usize,
    pub name: String,
    pub completed: bool,
    pub editing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenView {
    pub header: String,
    pub habits: Vec<HabitRow>,
    pub calendar: CalendarMonth,
    pub weekly: Vec<String>,
    pub status: String,
}

pub struct HabitAppController {
    service: HabitService,
    render_signal: RenderSignal,
    editing: Option<HabitId>,
    status: String,
}

impl HabitAppController {
    pub fn new(config: &AppConfig) -> Self {
        let render_signal = RenderSignal::default();
        let builder = HabitService::builder()
            .with_presence_policy(config.presence_policy)
            .with_weekly_policy(config.weekly_policy)
            .with_observer(Box::new(render_signal.clone()));
        let service = match config.today {
            Some(date) => builder.with_clock(FixedClock(date)).build(),
            None => builder.with_clock(LocalClock).build(),
        };
        Self {
            service,
            render_signal,
            editing: None,
            status: String::from("Ready"),
        }
    }

    pub fn service(&self) -> &HabitService {
        &self.service
    }

    pub fn editing(&self) -> Option<HabitId> {
        self.editing
    }

    /// Saves the pending rename if an edit is in progress, otherwise adds a
    /// new habit. Blank input is ignored.
    pub fn add_or_save_habit(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            debug!("ignoring blank habit name");
            return Ok(());
        }
        if let Some(id) = self.editing.take() {
            if let Some(index) = self.service.position(id) {
                self.service.edit_habit(index, text)?;
                self.set_status(format!("Renamed to \"{text}\""));
                return Ok(());
            }
            warn!(%id, "edit target disappeared, adding instead");
        }
        match self.service.add_habit(text) {
            Ok(_) => {
                self.set_status(format!("Added \"{text}\""));
                Ok(())
            }
            Err(TrackerError::EmptyName) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn toggle_habit(&mut self, index: usize, checked: bool) -> Result<()> {
        if self.service.set_completion(index, checked)? {
            let habit = self.service.habit(index)?;
            let verb = if checked { "Completed" } else { "Reopened" };
            self.set_status(format!("{verb} \"{}\"", habit.name));
        }
        Ok(())
    }

    pub fn start_edit(&mut self, index: usize) -> Result<()> {
        let habit = self.service.habit(index)?;
        self.editing = Some(habit.id);
        self.set_status(format!("Editing \"{}\", enter the new name", habit.name));
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        if self.editing.take().is_some() {
            self.set_status("Edit cancelled");
        }
    }

    pub fn delete_habit(&mut self, index: usize) -> Result<()> {
        let removed = self.service.delete_habit(index)?;
        if self.editing == Some(removed.id) {
            self.editing = None;
        }
        self.set_status(format!("Deleted \"{}\"", removed.name));
        Ok(())
    }

    pub fn view(&self) -> ScreenView {
        let habits = self.service.habits();
        let completed = habits.iter().filter(|habit| habit.is_completed).count();
        let rows = habits
            .iter()
            .enumerate()
            .map(|(idx, habit)| HabitRow {
                number: idx + 1,
                name: habit.name.clone(),
                completed: habit.is_completed,
                editing: self.editing == Some(habit.id),
            })
            .collect();
        let weekly = self
            .service
            .weekly_totals()
            .into_iter()
            .map(|week| format!("{}: {} habits completed", week.week, week.total))
            .collect();
        ScreenView {
            header: format!("Habits completed: {} / {}", completed, habits.len()),
            habits: rows,
            calendar: self.service.current_month(),
            weekly,
            status: self.status.clone(),
        }
    }

    pub(crate) fn take_render_request(&self) -> bool {
        self.render_signal.take()
    }

    pub(crate) fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.render_signal.raise();
    }
}

pub fn render_screen(view: &ScreenView) -> String {
    let mut out = String::new();
    out.push_str(&view.header);
    out.push('\n');
    out.push('\n');

    out.push_str(&view.calendar.title());
    out.push('\n');
    for row in view.calendar.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                let mark = if cell.is_completed { '*' } else { ' ' };
                format!(
                    "{:>2}{}{:<2}",
                    cell.day,
                    mark,
                    cell.count_label().unwrap_or_default()
                )
            })
            .collect();
        out.push_str(cells.join(" ").trim_end());
        out.push('\n');
    }
    out.push('\n');

    if view.habits.is_empty() {
        out.push_str("No habits yet. Use `add <name>`.\n");
    }
    for row in &view.habits {
        let check = if row.completed { 'x' } else { ' ' };
        let suffix = if row.editing { "  (editing)" } else { "" };
        out.push_str(&format!("{:>2}. [{}] {}{}\n", row.number, check, row.name, suffix));
    }
    out.push('\n');

    out.push_str("Weekly progress\n");
    for line in &view.weekly {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("\n> {}\n", view.status));
    out
}

/// One line of terminal input.
#[derive(Parser, Debug)]
#[command(
    name = "habit",
    no_binary_name = true,
    disable_version_flag = true,
    about = "Track today's habits"
)]
struct CommandLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Add a habit, or save the name of the habit being edited
    #[command(visible_alias = "save")]
    Add {
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        name: Vec<String>,
    },
    /// Mark habit N as done today
    Check {
        #[arg(value_parser = parse_row)]
        row: usize,
    },
    /// Clear habit N for today
    Uncheck {
        #[arg(value_parser = parse_row)]
        row: usize,
    },
    /// Start renaming habit N, then `add <new name>`
    Edit {
        #[arg(value_parser = parse_row)]
        row: usize,
    },
    /// Abandon the pending rename
    Cancel,
    /// Remove habit N
    #[command(visible_alias = "rm")]
    Delete {
        #[arg(value_parser = parse_row)]
        row: usize,
    },
    /// Redraw the screen
    Show,
    /// Print the current state as JSON
    Json,
    /// Leave
    #[command(visible_aliases = ["exit", "q"])]
    Quit,
}

/// Rows are shown 1-based.
fn parse_row(raw: &str) -> std::result::Result<usize, String> {
    let number: usize = raw
        .parse()
        .map_err(|_| format!("expected a row number, got `{raw}`"))?;
    number
        .checked_sub(1)
        .ok_or_else(|| String::from("rows start at 1"))
}

/// Splits `line` shell-style so quoted names stay whole. A blank line
/// redraws the screen.
fn parse_command(line: &str) -> Result<Command> {
    let mut words = shlex::split(line).ok_or_else(|| anyhow!("unbalanced quotes"))?;
    let Some(first) = words.first_mut() else {
        return Ok(Command::Show);
    };
    *first = first.to_ascii_lowercase();
    let parsed = CommandLine::try_parse_from(words)?;
    Ok(parsed.command)
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(?config, "starting habit tracker");
    let mut controller = HabitAppController::new(&config);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    write!(stdout, "{}", render_screen(&controller.view()))?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read input")?;
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                writeln!(stdout, "{err}")?;
                continue;
            }
        };
        let outcome = match command {
            Command::Add { name } => controller.add_or_save_habit(&name.join(" ")),
            Command::Check { row } => controller.toggle_habit(row, true),
            Command::Uncheck { row } => controller.toggle_habit(row, false),
            Command::Edit { row } => controller.start_edit(row),
            Command::Cancel => {
                controller.cancel_edit();
                Ok(())
            }
            Command::Delete { row } => controller.delete_habit(row),
            Command::Show => {
                write!(stdout, "{}", render_screen(&controller.view()))?;
                stdout.flush()?;
                continue;
            }
            Command::Json => {
                let json = serde_json::to_string_pretty(&controller.service().snapshot())
                    .context("failed to encode snapshot")?;
                writeln!(stdout, "{json}")?;
                continue;
            }
            Command::Quit => break,
        };
        if let Err(err) = outcome {
            controller.set_status(format!("Error: {err}"));
        }
        if controller.take_render_request() {
            write!(stdout, "{}", render_screen(&controller.view()))?;
            stdout.flush()?;
        }
    }
    info!("habit tracker closed");
    Ok(())
}
