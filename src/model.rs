use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical jigsaw puzzle being worked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    pub name: String,
    pub total_pieces: u32,
    pub created_at: DateTime<Utc>,
}

impl Puzzle {
    pub fn new(name: impl Into<String>, total_pieces: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            total_pieces,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[strum(serialize = "piece_placed")]
    PiecePlaced,
    #[strum(serialize = "piece_failed")]
    PieceFailed,
}

impl EventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "piece_placed" => Some(EventKind::PiecePlaced),
            "piece_failed" => Some(EventKind::PieceFailed),
            _ => None,
        }
    }
}

/// Outcome of one held piece. `elapsed` is active seconds, pauses excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub elapsed: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(kind: EventKind, elapsed: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            elapsed,
            timestamp: Some(timestamp),
        }
    }

    pub fn is_placed(&self) -> bool {
        self.kind == EventKind::PiecePlaced
    }
}

/// One sitting at a puzzle. Active while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub puzzle_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Session {
    pub fn new(puzzle_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            puzzle_id: puzzle_id.into(),
            started_at: now,
            ended_at: None,
            events: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn placed_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_placed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.events.len() - self.placed_count()
    }

    /// Sum of the work attributed to this session's events, in seconds.
    pub fn total_time(&self) -> f64 {
        self.events.iter().map(|e| e.elapsed).sum()
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
