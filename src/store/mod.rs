//! Storage collaborators. The engine only sees these two traits; durability
//! lives entirely behind them.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Event, Puzzle, Session};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Session-level operations the sitting engine persists through.
pub trait SessionStore {
    /// Stores a new active session. Fails with `ActiveSessionExists` when the
    /// puzzle already has one.
    fn create_session(&mut self, session: &Session) -> Result<()>;

    /// Appends one event. Not idempotent: one call per user action.
    fn append_event(&mut self, session_id: &str, event: &Event) -> Result<Event>;

    /// Removes and returns the last stored event, `EmptyLog` if none.
    fn undo_event(&mut self, session_id: &str) -> Result<Event>;

    fn end_session(&mut self, session_id: &str, ended_at: DateTime<Utc>) -> Result<Session>;

    fn active_session(&self, puzzle_id: &str) -> Result<Option<Session>>;
}

/// Puzzle bookkeeping used by the front end and the statistics views.
pub trait PuzzleCatalog {
    fn create_puzzle(&mut self, puzzle: &Puzzle) -> Result<()>;

    fn puzzles(&self) -> Result<Vec<Puzzle>>;

    fn puzzle(&self, id: &str) -> Result<Option<Puzzle>>;

    /// Deletes the puzzle together with all of its sessions.
    fn delete_puzzle(&mut self, id: &str) -> Result<()>;

    /// Every session of the puzzle, oldest first, events included.
    fn sessions_for(&self, puzzle_id: &str) -> Result<Vec<Session>>;

    fn delete_session(&mut self, session_id: &str) -> Result<()>;

    /// Looks a puzzle up by id, then by exact name, then by id prefix.
    fn find_puzzle(&self, key: &str) -> Result<Option<Puzzle>> {
        if let Some(p) = self.puzzle(key)? {
            return Ok(Some(p));
        }
        let puzzles = self.puzzles()?;
        if let Some(p) = puzzles.iter().find(|p| p.name == key) {
            return Ok(Some(p.clone()));
        }
        let mut by_prefix = puzzles.into_iter().filter(|p| p.id.starts_with(key));
        match (by_prefix.next(), by_prefix.next()) {
            (Some(p), None) => Ok(Some(p)),
            _ => Ok(None),
        }
    }
}
