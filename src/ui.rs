pub mod charting;
pub mod screen;
pub mod stats_view;

use chrono::Local;
use piecemeal::{
    stats::velocity,
    util::{format_clock, format_duration, format_piece_time},
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Frame,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    let area = f.area();
    screen::current_screen(app.state).render(app, area, f.buffer_mut());
}

fn legend(text: &str) -> Paragraph<'_> {
    Paragraph::new(Span::styled(
        text,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
}

/// Status line: the last action message, then any storage trouble.
fn status_line(app: &App) -> Line<'_> {
    let mut spans = Vec::new();
    if let Some(status) = &app.status {
        spans.push(Span::styled(
            status.as_str(),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(err) = &app.storage_error {
        if !spans.is_empty() {
            spans.push(Span::raw("   "));
        }
        spans.push(Span::styled(
            format!("offline, {} changes waiting ({err})", app.queue.len()),
            Style::default().fg(Color::Red),
        ));
    }
    Line::from(spans)
}

pub fn render_sitting(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(sitting) = &app.sitting else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(1),
            Constraint::Length(1), // clock
            Constraint::Length(1), // pause banner / piece timer
            Constraint::Length(1),
            Constraint::Length(1), // counts
            Constraint::Min(1),
            Constraint::Length(1), // status
            Constraint::Length(2), // legend
        ])
        .split(area);

    let placed_total = app
        .history
        .iter()
        .map(|s| s.placed_count())
        .sum::<usize>()
        + sitting.placed();
    Paragraph::new(Line::from(vec![
        Span::styled(app.puzzle.name.as_str(), bold_style),
        Span::styled(
            format!("   {}/{} placed", placed_total, app.puzzle.total_pieces),
            dim_style,
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format_clock(sitting.elapsed(app.now)),
        bold_style.fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let piece = if sitting.is_paused() {
        Span::styled(
            "PAUSED - (b) to resume",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        )
    } else {
        match sitting.piece_elapsed(app.now) {
            Some(secs) => Span::styled(
                format!("piece in hand {}", format_piece_time(secs)),
                bold_style.fg(Color::Magenta),
            ),
            None => Span::styled("hands empty - (space) to pick a piece", dim_style),
        }
    };
    Paragraph::new(piece)
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    let last = sitting
        .last_piece_secs()
        .map(format_piece_time)
        .unwrap_or_else(|| "-".into());
    Paragraph::new(Line::from(vec![
        Span::styled(format!("{} placed", sitting.placed()), Style::default().fg(Color::Green)),
        Span::raw("   "),
        Span::styled(format!("{} failed", sitting.failed()), Style::default().fg(Color::Red)),
        Span::raw("   "),
        Span::raw(format!("last piece {last}")),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[5], buf);

    Paragraph::new(status_line(app))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);

    legend("(space) pick / (enter) place / (f)ail / (b)reak / (u)ndo / (s)tats / (e)nd / (esc)ape")
        .render(chunks[8], buf);
}

pub fn render_recovery(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);

    let body = match &app.orphan {
        Some(orphan) => vec![
            Line::from(Span::styled(
                format!("{} has an unfinished sitting", app.puzzle.name),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "started {}",
                orphan
                    .started_at
                    .with_timezone(&Local)
                    .format("%a %d %b %H:%M")
            )),
            Line::from(format!(
                "{} placed, {} failed, {} recorded",
                orphan.placed_count(),
                orphan.failed_count(),
                format_duration(orphan.total_time())
            )),
        ],
        None => vec![Line::from("closing the previous sitting...")],
    };
    Paragraph::new(body)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(status_line(app))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    legend("(c)ontinue it / (d)iscard it and start fresh / (esc)ape").render(chunks[4], buf);
}

pub fn render_summary(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = &app.finished else {
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(vec![
        Line::from(Span::styled(
            "sitting over",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "{} placed / {} failed in {}",
            session.placed_count(),
            session.failed_count(),
            format_duration(session.total_time())
        )),
        Line::from(format!("{:.0} pieces per hour", velocity(session))),
    ])
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(status_line(app))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    legend("(s)tats / any other key to quit").render(chunks[4], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use chrono::{DateTime, Duration, Utc};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use piecemeal::{
        store::{MemoryStore, PuzzleCatalog, SessionStore},
        time_series::Scope,
        write_behind::WriteBehindQueue,
        Puzzle, Session,
    };

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn press(app: &mut App, store: &mut MemoryStore, code: KeyCode, at: i64) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), store, t(at));
    }

    fn create_test_app(orphan: bool) -> (App, MemoryStore) {
        let mut store = MemoryStore::new();
        let puzzle = Puzzle::new("Night Sky", 1000, t(0));
        store.create_puzzle(&puzzle).unwrap();
        if orphan {
            store
                .create_session(&Session::new(puzzle.id.clone(), t(0)))
                .unwrap();
        }
        let app = App::open(
            &mut store,
            puzzle,
            WriteBehindQueue::default(),
            Scope::Project,
            None,
            t(0),
        )
        .unwrap();
        (app, store)
    }

    fn render(app: &App) -> String {
        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        screen::current_screen(app.state).render(app, area, &mut buffer);
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_sitting_screen_shows_clock_and_piece() {
        let (mut app, mut store) = create_test_app(false);
        press(&mut app, &mut store, KeyCode::Char(' '), 60);
        app.now = t(65);

        let rendered = render(&app);
        assert!(rendered.contains("Night Sky"));
        assert!(rendered.contains("00:01:05"));
        assert!(rendered.contains("piece in hand 5.0s"));
    }

    #[test]
    fn test_sitting_screen_pause_banner() {
        let (mut app, mut store) = create_test_app(false);
        press(&mut app, &mut store, KeyCode::Char('b'), 10);
        app.now = t(500);

        let rendered = render(&app);
        assert!(rendered.contains("PAUSED"));
        assert!(rendered.contains("00:00:10"));
    }

    #[test]
    fn test_sitting_screen_shows_errors() {
        let (mut app, mut store) = create_test_app(false);
        press(&mut app, &mut store, KeyCode::Enter, 1);
        assert!(render(&app).contains("no piece"));
    }

    #[test]
    fn test_recovery_screen() {
        let (app, _) = create_test_app(true);
        assert_eq!(app.state, AppState::Recovery);
        let rendered = render(&app);
        assert!(rendered.contains("unfinished sitting"));
        assert!(rendered.contains("(c)ontinue"));
    }

    #[test]
    fn test_summary_screen() {
        let (mut app, mut store) = create_test_app(false);
        press(&mut app, &mut store, KeyCode::Char(' '), 0);
        press(&mut app, &mut store, KeyCode::Enter, 36);
        press(&mut app, &mut store, KeyCode::Char('e'), 40);

        let rendered = render(&app);
        assert!(rendered.contains("sitting over"));
        assert!(rendered.contains("1 placed / 0 failed"));
        assert!(rendered.contains("100 pieces per hour"));
    }

    #[test]
    fn test_tiny_area_does_not_panic() {
        let (app, _) = create_test_app(false);
        let area = Rect::new(0, 0, 12, 3);
        let mut buffer = Buffer::empty(area);
        screen::current_screen(app.state).render(&app, area, &mut buffer);
    }
}
