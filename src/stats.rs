//! Review-facing numbers for a puzzle and its sessions.
//!
//! Everything here is a pure function of the records passed in. Values are
//! not clamped: placing more pieces than the box declares shows up as
//! progress above 100%.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::histogram::Histogram;
use crate::model::{Puzzle, Session};
use crate::time_series::{piece_times, progression, Progression, Scope};
use crate::util::{mean, median, std_dev};

const ROLLING_WINDOW: usize = 5;

pub fn pieces_placed(sessions: &[Session]) -> usize {
    sessions.iter().map(Session::placed_count).sum()
}

pub fn pieces_failed(sessions: &[Session]) -> usize {
    sessions.iter().map(Session::failed_count).sum()
}

/// Percent of the declared piece count placed so far. 0 for a zero-piece puzzle.
pub fn progress(puzzle: &Puzzle, sessions: &[Session]) -> f64 {
    if puzzle.total_pieces == 0 {
        return 0.0;
    }
    100.0 * pieces_placed(sessions) as f64 / puzzle.total_pieces as f64
}

pub fn success_rate(placed: usize, failed: usize) -> f64 {
    let attempts = placed + failed;
    if attempts == 0 {
        0.0
    } else {
        placed as f64 / attempts as f64 * 100.0
    }
}

/// Mean over every individual placement, 0 when nothing was placed.
pub fn avg_time_per_piece(sessions: &[Session]) -> f64 {
    let times: Vec<f64> = sessions
        .iter()
        .flat_map(|s| s.events.iter())
        .filter(|e| e.is_placed())
        .map(|e| e.elapsed)
        .collect();
    mean(&times).unwrap_or(0.0)
}

/// Pieces per hour of recorded work.
pub fn velocity(session: &Session) -> f64 {
    let total = session.total_time();
    if total <= 0.0 {
        0.0
    } else {
        session.placed_count() as f64 / total * 3600.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub pieces_placed: usize,
    pub pieces_failed: usize,
    pub total_time: f64,
    pub velocity: f64,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            started_at: s.started_at,
            ended_at: s.ended_at,
            pieces_placed: s.placed_count(),
            pieces_failed: s.failed_count(),
            total_time: s.total_time(),
            velocity: velocity(s),
        }
    }
}

/// Whole-puzzle summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleStats {
    pub puzzle: Puzzle,
    pub total_pieces_placed: usize,
    pub total_pieces_failed: usize,
    pub total_time: f64,
    pub avg_time_per_piece: f64,
    pub median_time_per_piece: Option<f64>,
    pub piece_time_std_dev: Option<f64>,
    pub success_rate: f64,
    pub progress: f64,
    pub sessions_count: usize,
    pub sessions: Vec<SessionSummary>,
}

impl PuzzleStats {
    pub fn compute(puzzle: &Puzzle, sessions: &[Session]) -> Self {
        let placed = pieces_placed(sessions);
        let failed = pieces_failed(sessions);
        let times = piece_times(Scope::Project, sessions, None);
        Self {
            puzzle: puzzle.clone(),
            total_pieces_placed: placed,
            total_pieces_failed: failed,
            total_time: sessions.iter().map(Session::total_time).sum(),
            avg_time_per_piece: avg_time_per_piece(sessions),
            median_time_per_piece: median(&times),
            piece_time_std_dev: std_dev(&times),
            success_rate: success_rate(placed, failed),
            progress: progress(puzzle, sessions),
            sessions_count: sessions.len(),
            sessions: sessions.iter().map(SessionSummary::from).collect(),
        }
    }

    pub fn pieces_remaining(&self) -> i64 {
        self.puzzle.total_pieces as i64 - self.total_pieces_placed as i64
    }

    /// Projected seconds of work left at the current average pace.
    pub fn estimated_time_remaining(&self) -> Option<f64> {
        let remaining = self.pieces_remaining();
        if remaining <= 0 || self.avg_time_per_piece <= 0.0 {
            return None;
        }
        Some(remaining as f64 * self.avg_time_per_piece)
    }
}

/// Graph data for one scope: the histogram and the progression series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeCharts {
    pub scope: Scope,
    pub samples: usize,
    pub histogram: Option<Histogram>,
    pub progression: Progression,
}

impl ScopeCharts {
    pub fn compute(scope: Scope, sessions: &[Session], current: Option<&Session>) -> Self {
        let times = piece_times(scope, sessions, current);
        Self {
            scope,
            samples: times.len(),
            histogram: Histogram::from_samples(&times),
            progression: progression(&times, ROLLING_WINDOW),
        }
    }
}

/// Rounds for display the way the summary cards show numbers.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
