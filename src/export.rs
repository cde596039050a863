//! CSV export of a puzzle's piece events.

use serde::Serialize;
use std::io::Write;

use crate::error::Result;
use crate::model::{Puzzle, Session};
use crate::time_series::chronological;

const HEADER: [&str; 6] = [
    "puzzle",
    "session_id",
    "session_started_at",
    "kind",
    "elapsed_secs",
    "timestamp",
];

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    puzzle: &'a str,
    session_id: &'a str,
    session_started_at: String,
    kind: String,
    elapsed_secs: f64,
    timestamp: String,
}

/// Writes one row per event, sessions interleaved by occurrence time.
/// The header is written even when there are no events. Returns the number
/// of rows written.
pub fn write_events_csv<W: Write>(puzzle: &Puzzle, sessions: &[Session], out: W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(HEADER)?;
    let mut rows = 0;
    for (session, event) in chronological(sessions) {
        writer.serialize(EventRow {
            puzzle: &puzzle.name,
            session_id: &session.id,
            session_started_at: session.started_at.to_rfc3339(),
            kind: event.kind.to_string(),
            elapsed_secs: event.elapsed,
            timestamp: event.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
        })?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
