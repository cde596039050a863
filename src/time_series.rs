//! Ordered per-piece durations for the graphs.
//!
//! Within one sitting the event log is already chronological. Across
//! sessions, events are re-sorted by their own timestamp (or their session's
//! start when they have none), because sessions are not guaranteed to be
//! stored in the order they happened.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{Event, Session};
use crate::util::{mean, moving_average};

/// Which events feed a statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// The current sitting only.
    Sitting,
    /// Every session of the puzzle.
    #[default]
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    /// 1-based position of the piece in the series.
    pub piece: usize,
    pub seconds: f64,
}

impl TimeSeriesPoint {
    pub fn new(piece: usize, seconds: f64) -> Self {
        Self { piece, seconds }
    }
}

impl From<TimeSeriesPoint> for (f64, f64) {
    fn from(p: TimeSeriesPoint) -> Self {
        (p.piece as f64, p.seconds)
    }
}

/// Events of all `sessions` with their owning session, in true occurrence
/// order. Stable on ties.
pub fn chronological(sessions: &[Session]) -> Vec<(&Session, &Event)> {
    sessions
        .iter()
        .flat_map(|s| s.events.iter().map(move |e| (s, e)))
        .sorted_by_key(|(s, e)| occurred_at(e, s))
        .collect()
}

pub fn chronological_events(sessions: &[Session]) -> Vec<&Event> {
    chronological(sessions).into_iter().map(|(_, e)| e).collect()
}

fn occurred_at(event: &Event, session: &Session) -> DateTime<Utc> {
    event.timestamp.unwrap_or(session.started_at)
}

/// Placed-piece durations of one sitting, in log order.
pub fn sitting_piece_times(session: &Session) -> Vec<f64> {
    session
        .events
        .iter()
        .filter(|e| e.is_placed())
        .map(|e| e.elapsed)
        .collect()
}

/// Placed-piece durations across every session, by occurrence time.
pub fn project_piece_times(sessions: &[Session]) -> Vec<f64> {
    chronological_events(sessions)
        .into_iter()
        .filter(|e| e.is_placed())
        .map(|e| e.elapsed)
        .collect()
}

/// Piece times for `scope`. `current` is the sitting in progress, if any;
/// without one the sitting scope is empty.
pub fn piece_times(scope: Scope, sessions: &[Session], current: Option<&Session>) -> Vec<f64> {
    match scope {
        Scope::Sitting => current.map(sitting_piece_times).unwrap_or_default(),
        Scope::Project => project_piece_times(sessions),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum TrendDirection {
    #[strum(serialize = "improving")]
    Improving,
    #[strum(serialize = "no improvement")]
    NoImprovement,
}

/// Qualitative comparison of the two halves of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub first_half_mean: f64,
    pub second_half_mean: f64,
    pub direction: TrendDirection,
}

/// Needs at least three samples. The first half takes the extra sample when
/// the count is odd.
pub fn trend(samples: &[f64]) -> Option<Trend> {
    if samples.len() < 3 {
        return None;
    }
    let split = samples.len().div_ceil(2);
    let (first, second) = samples.split_at(split);
    let first_half_mean = mean(first)?;
    let second_half_mean = mean(second)?;
    let direction = if second_half_mean < first_half_mean {
        TrendDirection::Improving
    } else {
        TrendDirection::NoImprovement
    };
    Some(Trend {
        first_half_mean,
        second_half_mean,
        direction,
    })
}

/// Data behind the progression chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progression {
    pub points: Vec<TimeSeriesPoint>,
    pub rolling: Vec<TimeSeriesPoint>,
    pub trend: Option<Trend>,
}

pub fn progression(samples: &[f64], window: usize) -> Progression {
    let to_points = |values: &[f64]| {
        values
            .iter()
            .enumerate()
            .map(|(i, s)| TimeSeriesPoint::new(i + 1, *s))
            .collect::<Vec<_>>()
    };
    Progression {
        points: to_points(samples),
        rolling: to_points(&moving_average(samples, window)),
        trend: trend(samples),
    }
}
