//! Ordered, undoable record of piece outcomes for one session.
//!
//! These functions only touch the in-memory session. Persisting the change
//! is the caller's job, through the write-behind queue.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Result, TrackerError};
use crate::model::{Event, EventKind, Session};

/// Appends an outcome to the session and returns the stored event.
/// Negative durations are clamped to zero.
pub fn append(session: &mut Session, kind: EventKind, elapsed: f64, now: DateTime<Utc>) -> Event {
    let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
    let event = Event::new(kind, elapsed, now);
    session.events.push(event.clone());
    debug!(session = %session.id, %kind, elapsed, "event appended");
    event
}

/// Removes and returns the most recent event. Each call removes a different
/// event; there is no redo.
pub fn undo_last(session: &mut Session) -> Result<Event> {
    let removed = session.events.pop().ok_or(TrackerError::EmptyLog)?;
    debug!(session = %session.id, kind = %removed.kind, "event undone");
    Ok(removed)
}
