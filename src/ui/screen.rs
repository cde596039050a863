use ratatui::{buffer::Buffer, layout::Rect};

use crate::{
    ui::{render_recovery, render_sitting, render_summary, stats_view::render_stats},
    App, AppState,
};

/// A UI Screen boundary: one per app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

/// Orphaned session prompt, shown before any sitting starts
pub struct RecoveryScreen;

impl Screen for RecoveryScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_recovery(app, area, buf);
    }
}

/// Live clock, piece timer and counters
pub struct SittingScreen;

impl Screen for SittingScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_sitting(app, area, buf);
    }
}

pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_stats(app, area, buf);
    }
}

pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_summary(app, area, buf);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Recovery => Box::new(RecoveryScreen),
        AppState::Sitting => Box::new(SittingScreen),
        AppState::Stats => Box::new(StatsScreen),
        AppState::Summary => Box::new(SummaryScreen),
    }
}
