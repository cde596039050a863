pub mod ui;

use chrono::{DateTime, Utc};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use piecemeal::{
    action::{self, Action, Outcome},
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    export::write_events_csv,
    histogram::Histogram,
    recovery::{self, RecoveryChoice},
    runtime::{CrosstermEventSource, FixedTicker, Runner, Ticker, TrackerEvent, TrackerEventSource},
    sitting::Sitting,
    stats::{round_to, velocity, PuzzleStats, ScopeCharts},
    store::{PuzzleCatalog, SessionStore, SqliteStore},
    time_series::{Progression, Scope},
    util::{format_duration, format_piece_time},
    write_behind::WriteBehindQueue,
    EventKind, Puzzle, Session, TrackerError,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use serde::Serialize;
use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin, Write},
    path::PathBuf,
    sync::Mutex,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthChar;

/// pause-aware jigsaw puzzle sitting tracker
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Track jigsaw puzzle sittings piece by piece: time every placement, pause for breaks, undo mistakes, and review how your pace develops across a whole puzzle."
)]
pub struct Cli {
    /// database file to use instead of the configured one
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// register a new puzzle
    Add {
        /// display name
        name: String,
        /// number of pieces in the box
        pieces: u32,
    },
    /// list puzzles with their progress
    List,
    /// delete a puzzle and all of its sessions
    Remove {
        /// puzzle id, id prefix or name
        puzzle: String,
    },
    /// start a sitting, or pick up an unfinished one
    Sit {
        /// puzzle id, id prefix or name
        puzzle: String,
        /// continue an unfinished sitting without asking
        #[clap(long, conflicts_with = "discard")]
        resume: bool,
        /// close an unfinished sitting without asking and start fresh
        #[clap(long)]
        discard: bool,
    },
    /// print statistics for a puzzle
    Stats {
        /// puzzle id, id prefix or name
        puzzle: String,
        /// which pieces feed the charts
        #[clap(long, value_enum)]
        scope: Option<Scope>,
        /// print machine-readable JSON
        #[clap(long)]
        json: bool,
    },
    /// write a puzzle's piece events as CSV ("-" for stdout)
    Export {
        /// puzzle id, id prefix or name
        puzzle: String,
        /// output file
        file: PathBuf,
    },
    /// delete a single session and its events
    DropSession {
        /// session id
        session: String,
    },
}

impl Command {
    fn recovery_choice(&self) -> Option<RecoveryChoice> {
        match self {
            Command::Sit { resume: true, .. } => Some(RecoveryChoice::Continue),
            Command::Sit { discard: true, .. } => Some(RecoveryChoice::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Recovery,
    Sitting,
    Stats,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything the sitting screens show.
#[derive(Debug)]
pub struct App {
    pub puzzle: Puzzle,
    /// Closed sessions of the puzzle, including one ended here.
    pub history: Vec<Session>,
    pub sitting: Option<Sitting>,
    pub orphan: Option<Session>,
    pub finished: Option<Session>,
    pub queue: WriteBehindQueue,
    pub state: AppState,
    pub scope: Scope,
    pub status: Option<String>,
    pub storage_error: Option<String>,
    /// A discarded orphan's end is queued; the new sitting starts once it lands.
    pub awaiting_discard: bool,
    pub now: DateTime<Utc>,
}

impl App {
    pub fn open<S: SessionStore + PuzzleCatalog>(
        store: &mut S,
        puzzle: Puzzle,
        queue: WriteBehindQueue,
        scope: Scope,
        choice: Option<RecoveryChoice>,
        now: DateTime<Utc>,
    ) -> Result<Self, TrackerError> {
        let orphan = recovery::find_orphan(store, &puzzle.id)?;
        let history = store
            .sessions_for(&puzzle.id)?
            .into_iter()
            .filter(|s| !s.is_active())
            .collect();

        let has_orphan = orphan.is_some();
        let mut app = Self {
            puzzle,
            history,
            sitting: None,
            orphan,
            finished: None,
            queue,
            state: AppState::Recovery,
            scope,
            status: None,
            storage_error: None,
            awaiting_discard: false,
            now,
        };

        match (has_orphan, choice) {
            (true, Some(choice)) => app.resolve_orphan(store, choice, now)?,
            (true, None) => {}
            (false, _) => app.begin(store, now)?,
        }
        Ok(app)
    }

    fn begin<S: SessionStore + ?Sized>(
        &mut self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let sitting = Sitting::begin(&self.puzzle, store, &mut self.queue, now)?;
        self.sitting = Some(sitting);
        self.state = AppState::Sitting;
        self.status = None;
        Ok(())
    }

    pub fn resolve_orphan<S: SessionStore + ?Sized>(
        &mut self,
        store: &mut S,
        choice: RecoveryChoice,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let Some(orphan) = self.orphan.take() else {
            return Ok(());
        };
        let mut closed = orphan.clone();
        match recovery::resolve(orphan, choice, &mut self.queue, now) {
            Some(sitting) => {
                self.sitting = Some(sitting);
                self.state = AppState::Sitting;
                Ok(())
            }
            None => {
                closed.ended_at = Some(now);
                self.history.push(closed);
                self.awaiting_discard = true;
                self.queue.drain(store).into_result()?;
                self.awaiting_discard = false;
                self.begin(store, now)
            }
        }
    }

    pub fn handle_key<S: SessionStore + ?Sized>(
        &mut self,
        key: KeyEvent,
        store: &mut S,
        now: DateTime<Utc>,
    ) -> Flow {
        self.now = now;
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            // a live sitting stays open and is offered for recovery next time
            return Flow::Quit;
        }

        match self.state {
            AppState::Recovery => {
                let choice = match key.code {
                    KeyCode::Char('c') => RecoveryChoice::Continue,
                    KeyCode::Char('d') => RecoveryChoice::Discard,
                    KeyCode::Esc => return Flow::Quit,
                    _ => return Flow::Continue,
                };
                if let Err(e) = self.resolve_orphan(store, choice, now) {
                    self.report(e);
                }
            }
            AppState::Sitting => match key.code {
                KeyCode::Char('s') => self.state = AppState::Stats,
                KeyCode::Char('e') => self.end_sitting(now),
                KeyCode::Esc => {
                    self.end_sitting(now);
                    return Flow::Quit;
                }
                _ => {
                    if let Some(action) = Action::from_key(&key) {
                        self.apply(action, now);
                    }
                }
            },
            AppState::Stats => match key.code {
                KeyCode::Tab => self.toggle_scope(),
                KeyCode::Char('s') | KeyCode::Backspace => {
                    self.state = if self.sitting.is_some() {
                        AppState::Sitting
                    } else {
                        AppState::Summary
                    };
                }
                KeyCode::Esc => {
                    self.end_sitting(now);
                    return Flow::Quit;
                }
                _ => {}
            },
            AppState::Summary => match key.code {
                KeyCode::Char('s') => self.state = AppState::Stats,
                _ => return Flow::Quit,
            },
        }
        Flow::Continue
    }

    /// Flushes due writes. Returns whether the screen needs a redraw.
    pub fn on_tick<S: SessionStore + ?Sized>(&mut self, store: &mut S, now: DateTime<Utc>) -> bool {
        self.now = now;
        self.queue.flush(store, now);

        let storage_error = self.queue.last_error().map(str::to_owned);
        let storage_changed = storage_error != self.storage_error;
        self.storage_error = storage_error;

        if self.awaiting_discard && self.queue.is_empty() {
            self.awaiting_discard = false;
            if let Err(e) = self.begin(store, now) {
                self.report(e);
            }
            return true;
        }

        match (&self.state, &self.sitting) {
            // the clock is frozen during a break
            (AppState::Sitting, Some(sitting)) => !sitting.is_paused() || storage_changed,
            _ => storage_changed,
        }
    }

    fn apply(&mut self, action: Action, now: DateTime<Utc>) {
        let Some(sitting) = self.sitting.as_mut() else {
            return;
        };
        self.status = match action::apply(sitting, &mut self.queue, action, now) {
            Ok(Outcome::Undone(ev)) => Some(format!(
                "undid {} ({})",
                match ev.kind {
                    EventKind::PiecePlaced => "placement",
                    EventKind::PieceFailed => "failed attempt",
                },
                format_piece_time(ev.elapsed)
            )),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    fn end_sitting(&mut self, now: DateTime<Utc>) {
        if let Some(sitting) = self.sitting.take() {
            let session = sitting.end(&mut self.queue, now);
            self.history.push(session.clone());
            self.finished = Some(session);
            self.state = AppState::Summary;
        }
    }

    fn toggle_scope(&mut self) {
        self.scope = match self.scope {
            Scope::Sitting => Scope::Project,
            Scope::Project => Scope::Sitting,
        };
    }

    fn report(&mut self, e: TrackerError) {
        warn!(error = %e, "sitting action failed");
        self.status = Some(e.to_string());
    }

    /// Puzzle totals and the charts for the selected scope, live sitting included.
    pub fn stats_view(&self) -> (PuzzleStats, ScopeCharts) {
        let live = self.sitting.as_ref().map(|s| s.session().clone());
        let mut sessions = self.history.clone();
        sessions.extend(live.clone());
        let current = live.or_else(|| self.finished.clone());
        (
            PuzzleStats::compute(&self.puzzle, &sessions),
            ScopeCharts::compute(self.scope, &sessions, current.as_ref()),
        )
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = FileConfigStore::new().load();
    let db_path = cli.db.clone().unwrap_or_else(|| config.resolved_db_path());
    let mut store = SqliteStore::open(&db_path)?;
    info!(db = %db_path.display(), command = ?cli.command, "starting");

    match &cli.command {
        Command::Sit { puzzle, .. } => sit(&mut store, &config, puzzle, cli.command.recovery_choice()),
        command => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            run_command(command, &mut store, &config, SystemClock.now(), &mut out)
        }
    }
}

/// File logging in the state dir; nothing is installed when the file cannot
/// be opened, so the terminal stays clean.
fn init_tracing() {
    let Some(file) = AppDirs::log_path().and_then(|path| open_log(&path).ok()) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn open_log(path: &std::path::Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn lookup<S: PuzzleCatalog + ?Sized>(store: &S, key: &str) -> Result<Puzzle, TrackerError> {
    store
        .find_puzzle(key)?
        .ok_or_else(|| TrackerError::NotFound(format!("puzzle {key}")))
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Pads or truncates `name` to exactly `width` terminal columns.
fn fit_name(name: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in name.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

fn run_command<S: SessionStore + PuzzleCatalog>(
    command: &Command,
    store: &mut S,
    config: &Config,
    now: DateTime<Utc>,
    out: &mut dyn Write,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Add { name, pieces } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(TrackerError::invalid_state("puzzle name must not be empty").into());
            }
            let puzzle = Puzzle::new(name, *pieces, now);
            store.create_puzzle(&puzzle)?;
            writeln!(out, "added {} ({} pieces) as {}", puzzle.name, pieces, short_id(&puzzle.id))?;
        }
        Command::List => {
            let puzzles = store.puzzles()?;
            if puzzles.is_empty() {
                writeln!(out, "no puzzles yet; add one with `piecemeal add <name> <pieces>`")?;
            }
            for puzzle in puzzles {
                let sessions = store.sessions_for(&puzzle.id)?;
                let stats = PuzzleStats::compute(&puzzle, &sessions);
                let marker = if sessions.iter().any(Session::is_active) {
                    "  (unfinished sitting)"
                } else {
                    ""
                };
                writeln!(
                    out,
                    "{}  {} {:>5}/{:<5} {:>5.1}%{}",
                    short_id(&puzzle.id),
                    fit_name(&puzzle.name, 24),
                    stats.total_pieces_placed,
                    puzzle.total_pieces,
                    round_to(stats.progress, 1),
                    marker
                )?;
            }
        }
        Command::Remove { puzzle } => {
            let puzzle = lookup(store, puzzle)?;
            store.delete_puzzle(&puzzle.id)?;
            writeln!(out, "removed {}", puzzle.name)?;
        }
        Command::Stats { puzzle, scope, json } => {
            let puzzle = lookup(store, puzzle)?;
            let sessions = store.sessions_for(&puzzle.id)?;
            let scope = scope.unwrap_or(config.default_scope);
            // sitting scope reads the unfinished sitting, else the latest one
            let current = sessions
                .iter()
                .find(|s| s.is_active())
                .or_else(|| sessions.iter().max_by_key(|s| s.started_at));
            let stats = PuzzleStats::compute(&puzzle, &sessions);
            let charts = ScopeCharts::compute(scope, &sessions, current);
            if *json {
                serde_json::to_writer_pretty(&mut *out, &StatsReport::new(&stats, &charts))?;
                writeln!(out)?;
            } else {
                write_stats(out, &stats, &charts)?;
            }
        }
        Command::Export { puzzle, file } => {
            let puzzle = lookup(store, puzzle)?;
            let sessions = store.sessions_for(&puzzle.id)?;
            let rows = if file.as_os_str() == "-" {
                write_events_csv(&puzzle, &sessions, &mut *out)?
            } else {
                let rows = write_events_csv(&puzzle, &sessions, File::create(file)?)?;
                writeln!(out, "wrote {rows} events to {}", file.display())?;
                rows
            };
            info!(puzzle = %puzzle.name, rows, "exported events");
        }
        Command::DropSession { session } => {
            store.delete_session(session)?;
            writeln!(out, "deleted session {}", short_id(session))?;
        }
        Command::Sit { .. } => {
            return Err(TrackerError::invalid_state("sit needs the terminal front end").into());
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport<'a> {
    #[serde(flatten)]
    stats: &'a PuzzleStats,
    avg_time_per_piece_rounded: f64,
    success_rate_rounded: f64,
    progress_rounded: f64,
    scope: Scope,
    histogram: Option<&'a Histogram>,
    progression: &'a Progression,
}

impl<'a> StatsReport<'a> {
    fn new(stats: &'a PuzzleStats, charts: &'a ScopeCharts) -> Self {
        Self {
            stats,
            avg_time_per_piece_rounded: round_to(stats.avg_time_per_piece, 2),
            success_rate_rounded: round_to(stats.success_rate, 1),
            progress_rounded: round_to(stats.progress, 1),
            scope: charts.scope,
            histogram: charts.histogram.as_ref(),
            progression: &charts.progression,
        }
    }
}

fn write_stats(out: &mut dyn Write, stats: &PuzzleStats, charts: &ScopeCharts) -> io::Result<()> {
    let puzzle = &stats.puzzle;
    writeln!(out, "{} ({} pieces)", puzzle.name, puzzle.total_pieces)?;
    writeln!(
        out,
        "progress     {:.1}%  ({} placed, {} failed, success {:.1}%)",
        round_to(stats.progress, 1),
        stats.total_pieces_placed,
        stats.total_pieces_failed,
        round_to(stats.success_rate, 1)
    )?;
    writeln!(
        out,
        "time         {} over {} sessions",
        format_duration(stats.total_time),
        stats.sessions_count
    )?;
    writeln!(
        out,
        "per piece    avg {:.2}s  median {}  sd {}",
        round_to(stats.avg_time_per_piece, 2),
        stats
            .median_time_per_piece
            .map(format_piece_time)
            .unwrap_or_else(|| "-".into()),
        stats
            .piece_time_std_dev
            .map(|sd| format!("{sd:.2}s"))
            .unwrap_or_else(|| "-".into())
    )?;
    if let Some(eta) = stats.estimated_time_remaining() {
        writeln!(
            out,
            "remaining    {} pieces, about {}",
            stats.pieces_remaining(),
            format_duration(eta)
        )?;
    }
    match &charts.progression.trend {
        Some(trend) => writeln!(
            out,
            "trend ({})  {} ({} -> {})",
            charts.scope,
            trend.direction,
            format_piece_time(trend.first_half_mean),
            format_piece_time(trend.second_half_mean)
        )?,
        None => writeln!(out, "trend ({})  not enough pieces", charts.scope)?,
    }
    if let Some(histogram) = &charts.histogram {
        for (label, count) in histogram.labelled() {
            writeln!(out, "  {label:>6} {}", "#".repeat(count as usize))?;
        }
    }
    Ok(())
}

fn sit(
    store: &mut SqliteStore,
    config: &Config,
    key: &str,
    choice: Option<RecoveryChoice>,
) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let clock = SystemClock;
    let puzzle = lookup(store, key)?;
    let queue = WriteBehindQueue::new(config.retry_policy());
    let mut app = App::open(store, puzzle, queue, config.default_scope, choice, clock.now())?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(config.tick_interval()),
    );
    let outcome = start_tui(&mut terminal, &runner, &mut app, store, &clock);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let report = app.queue.drain(store);
    if report.pending > 0 {
        warn!(pending = report.pending, "writes left unsaved at exit");
        eprintln!(
            "warning: {} changes could not be saved: {}",
            report.pending,
            report.unavailable.as_deref().unwrap_or("storage unavailable")
        );
    }
    outcome?;

    if let Some(session) = &app.finished {
        println!(
            "{}: {} placed, {} failed in {} ({:.0} pieces/h)",
            app.puzzle.name,
            session.placed_count(),
            session.failed_count(),
            format_duration(session.total_time()),
            velocity(session)
        );
    } else if app.sitting.is_some() {
        println!(
            "sitting left open; `piecemeal sit {}` picks it up",
            app.puzzle.name
        );
    }
    Ok(())
}

fn start_tui<B, E, T, S>(
    terminal: &mut Terminal<B>,
    runner: &Runner<E, T>,
    app: &mut App,
    store: &mut S,
    clock: &dyn Clock,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    E: TrackerEventSource,
    T: Ticker,
    S: SessionStore + ?Sized,
{
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let redraw = match runner.step() {
            TrackerEvent::Tick => app.on_tick(store, clock.now()),
            TrackerEvent::Resize => true,
            TrackerEvent::Key(key) => match app.handle_key(key, store, clock.now()) {
                Flow::Quit => break,
                Flow::Continue => true,
            },
        };
        if redraw {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use piecemeal::store::MemoryStore;
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn store_with_puzzle() -> (MemoryStore, Puzzle) {
        let mut store = MemoryStore::new();
        let puzzle = Puzzle::new("Harbour", 500, t(0));
        store.create_puzzle(&puzzle).unwrap();
        (store, puzzle)
    }

    fn run(store: &mut MemoryStore, command: Command) -> String {
        let mut out = Vec::new();
        run_command(&command, store, &Config::default(), t(0), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_cli_parses_sit_flags() {
        let cli = Cli::parse_from(["piecemeal", "sit", "Harbour", "--resume"]);
        assert_eq!(cli.command.recovery_choice(), Some(RecoveryChoice::Continue));

        let cli = Cli::parse_from(["piecemeal", "sit", "Harbour", "--discard"]);
        assert_eq!(cli.command.recovery_choice(), Some(RecoveryChoice::Discard));

        let cli = Cli::parse_from(["piecemeal", "sit", "Harbour"]);
        assert_eq!(cli.command.recovery_choice(), None);
    }

    #[test]
    fn test_cli_resume_conflicts_with_discard() {
        let err = Cli::try_parse_from(["piecemeal", "sit", "x", "--resume", "--discard"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_global_db_and_stats_scope() {
        let cli = Cli::parse_from([
            "piecemeal", "stats", "Harbour", "--scope", "sitting", "--json", "--db", "/tmp/p.db",
        ]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/p.db")));
        assert_eq!(
            cli.command,
            Command::Stats {
                puzzle: "Harbour".into(),
                scope: Some(Scope::Sitting),
                json: true
            }
        );
    }

    #[test]
    fn test_add_and_list() {
        let mut store = MemoryStore::new();
        let added = run(
            &mut store,
            Command::Add {
                name: "  Lighthouse ".into(),
                pieces: 1000,
            },
        );
        assert!(added.starts_with("added Lighthouse (1000 pieces)"));
        let listed = run(&mut store, Command::List);
        assert!(listed.contains("Lighthouse"));
        assert!(listed.contains("0/1000"));
    }

    #[test]
    fn test_fit_name_counts_columns() {
        assert_eq!(fit_name("Alps", 6), "Alps  ");
        assert_eq!(fit_name("富士山", 4), "富士");
        assert_eq!(fit_name("富士山", 5), "富士 ");
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let mut store = MemoryStore::new();
        let mut out = Vec::new();
        let cmd = Command::Add {
            name: "   ".into(),
            pieces: 10,
        };
        assert!(run_command(&cmd, &mut store, &Config::default(), t(0), &mut out).is_err());
        assert!(store.puzzles().unwrap().is_empty());
    }

    #[test]
    fn test_stats_json_uses_camel_case() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&session).unwrap();
        store
            .append_event(
                &session.id,
                &piecemeal::Event::new(EventKind::PiecePlaced, 4.0, t(4)),
            )
            .unwrap();
        store.end_session(&session.id, t(10)).unwrap();

        let text = run(
            &mut store,
            Command::Stats {
                puzzle: "Harbour".into(),
                scope: None,
                json: true,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["totalPiecesPlaced"], 1);
        assert_eq!(value["progressRounded"], 0.2);
        assert_eq!(value["scope"], "project");
    }

    #[test]
    fn test_unknown_puzzle_is_not_found() {
        let mut store = MemoryStore::new();
        let mut out = Vec::new();
        let cmd = Command::Remove {
            puzzle: "nope".into(),
        };
        let err = run_command(&cmd, &mut store, &Config::default(), t(0), &mut out).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_app_flow_place_pause_end() {
        let (mut store, puzzle) = store_with_puzzle();
        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, t(0)).unwrap();
        assert_eq!(app.state, AppState::Sitting);

        app.handle_key(key(KeyCode::Char(' ')), &mut store, t(1));
        app.handle_key(key(KeyCode::Enter), &mut store, t(6));
        assert_eq!(app.sitting.as_ref().unwrap().placed(), 1);

        app.handle_key(key(KeyCode::Char('b')), &mut store, t(7));
        assert!(!app.on_tick(&mut store, t(8)), "no redraw while paused");
        app.handle_key(key(KeyCode::Char('b')), &mut store, t(20));

        app.handle_key(key(KeyCode::Char('e')), &mut store, t(21));
        assert_eq!(app.state, AppState::Summary);
        app.on_tick(&mut store, t(22));
        assert!(app.queue.is_empty());
        let stored = store.sessions_for(&app.puzzle.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].ended_at, Some(t(21)));
        assert_eq!(stored[0].placed_count(), 1);
    }

    #[test]
    fn test_invalid_action_sets_status() {
        let (mut store, puzzle) = store_with_puzzle();
        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, t(0)).unwrap();
        app.handle_key(key(KeyCode::Char('f')), &mut store, t(1));
        assert!(app.status.is_some());
        assert_eq!(app.sitting.as_ref().unwrap().failed(), 0);
    }

    #[test]
    fn test_orphan_opens_recovery_then_discard_starts_fresh() {
        let (mut store, puzzle) = store_with_puzzle();
        let orphan = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&orphan).unwrap();

        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, t(100)).unwrap();
        assert_eq!(app.state, AppState::Recovery);

        app.handle_key(key(KeyCode::Char('d')), &mut store, t(101));
        assert_eq!(app.state, AppState::Sitting);
        let fresh = app.sitting.as_ref().unwrap().session().id.clone();
        assert_ne!(fresh, orphan.id);
        assert_eq!(store.session(&orphan.id).unwrap().ended_at, Some(t(101)));
    }

    #[test]
    fn test_resume_flag_continues_orphan() {
        let (mut store, puzzle) = store_with_puzzle();
        let orphan = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&orphan).unwrap();

        let app = App::open(
            &mut store,
            puzzle,
            WriteBehindQueue::default(),
            Scope::Project,
            Some(RecoveryChoice::Continue),
            t(50),
        )
        .unwrap();
        assert_eq!(app.state, AppState::Sitting);
        assert_eq!(app.sitting.as_ref().unwrap().session().id, orphan.id);
    }

    #[test]
    fn test_stats_screen_toggles_scope() {
        let (mut store, puzzle) = store_with_puzzle();
        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, t(0)).unwrap();
        app.handle_key(key(KeyCode::Char('s')), &mut store, t(1));
        assert_eq!(app.state, AppState::Stats);
        app.handle_key(key(KeyCode::Tab), &mut store, t(1));
        assert_eq!(app.scope, Scope::Sitting);
        app.handle_key(key(KeyCode::Backspace), &mut store, t(1));
        assert_eq!(app.state, AppState::Sitting);
    }

    #[test]
    fn test_ctrl_c_leaves_sitting_open() {
        let (mut store, puzzle) = store_with_puzzle();
        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, t(0)).unwrap();
        let flow = app.handle_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut store,
            t(1),
        );
        assert_eq!(flow, Flow::Quit);
        app.queue.drain(&mut store);
        assert!(store.active_session(&app.puzzle.id).unwrap().is_some());
    }

    #[test]
    fn test_start_tui_runs_until_quit() {
        use piecemeal::clock::ManualClock;
        use piecemeal::runtime::TestEventSource;

        let (mut store, puzzle) = store_with_puzzle();
        let clock = ManualClock::new(t(0));
        let mut app = App::open(&mut store, puzzle, WriteBehindQueue::default(), Scope::Project, None, clock.now()).unwrap();

        let (tx, rx) = mpsc::channel();
        for code in [KeyCode::Char(' '), KeyCode::Char('p'), KeyCode::Esc] {
            tx.send(TrackerEvent::Key(key(code))).unwrap();
        }
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(std::time::Duration::from_millis(5)),
        );
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        start_tui(&mut terminal, &runner, &mut app, &mut store, &clock).unwrap();

        assert_eq!(app.state, AppState::Summary);
        assert_eq!(app.finished.as_ref().unwrap().placed_count(), 1);
    }
}
