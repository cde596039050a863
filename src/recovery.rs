//! Rebuilding a live timer for a session whose process went away.
//!
//! Only the recorded events survive an unclean exit, so the session clock is
//! restarted from a synthetic start time: `now - Σ elapsed`. Wall-clock time
//! the session sat open without recorded work is not counted. A piece that
//! was held at the moment of the crash is lost.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::model::Session;
use crate::sitting::Sitting;
use crate::store::SessionStore;
use crate::timer::SessionTimer;
use crate::write_behind::{PendingWrite, WriteBehindQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    /// Keep working in the orphaned session.
    Continue,
    /// Close the orphaned session as of now; its events stay in the history.
    Discard,
}

/// Reconstructs timer state for `session` at wall time `now`.
pub fn recover(session: Session, now: DateTime<Utc>) -> Sitting {
    let total_secs: f64 = session.total_time();
    let synthetic_start = now - Duration::milliseconds((total_secs * 1000.0).round() as i64);
    let last_placed = session
        .events
        .iter()
        .rev()
        .find(|e| e.is_placed())
        .map(|e| e.elapsed);

    info!(
        session = %session.id,
        events = session.events.len(),
        total_secs,
        "recovered sitting"
    );
    Sitting::from_parts(session, SessionTimer::resumed_from(synthetic_start, last_placed))
}

/// The unended session of a puzzle, if the store has one.
pub fn find_orphan<S: SessionStore + ?Sized>(store: &S, puzzle_id: &str) -> Result<Option<Session>> {
    store.active_session(puzzle_id)
}

/// Applies the user's decision about an orphaned session. `Continue` yields a
/// live sitting; `Discard` queues the session's end and yields `None`, after
/// which a new sitting may begin once the queue has flushed.
pub fn resolve(
    orphan: Session,
    choice: RecoveryChoice,
    queue: &mut WriteBehindQueue,
    now: DateTime<Utc>,
) -> Option<Sitting> {
    match choice {
        RecoveryChoice::Continue => Some(recover(orphan, now)),
        RecoveryChoice::Discard => {
            warn!(session = %orphan.id, events = orphan.events.len(), "discarding orphaned session");
            queue.push(PendingWrite::EndSession {
                session_id: orphan.id,
                ended_at: now,
            });
            None
        }
    }
}
