use chrono::{DateTime, Utc};

use super::{PuzzleCatalog, SessionStore};
use crate::error::{Result, TrackerError};
use crate::model::{Event, Puzzle, Session};

/// In-memory store. `set_offline(true)` makes every call fail with
/// `PersistenceUnavailable`, which is how the write-behind path is exercised.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    puzzles: Vec<Puzzle>,
    sessions: Vec<Session>,
    offline: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Number of successful writes, for asserting on queue behavior.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(TrackerError::PersistenceUnavailable(
                "memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| TrackerError::NotFound(format!("session {id}")))
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&mut self, session: &Session) -> Result<()> {
        self.check_online()?;
        if self
            .sessions
            .iter()
            .any(|s| s.puzzle_id == session.puzzle_id && s.is_active())
        {
            return Err(TrackerError::ActiveSessionExists(session.puzzle_id.clone()));
        }
        self.sessions.push(session.clone());
        self.writes += 1;
        Ok(())
    }

    fn append_event(&mut self, session_id: &str, event: &Event) -> Result<Event> {
        self.check_online()?;
        self.session_mut(session_id)?.events.push(event.clone());
        self.writes += 1;
        Ok(event.clone())
    }

    fn undo_event(&mut self, session_id: &str) -> Result<Event> {
        self.check_online()?;
        let removed = self
            .session_mut(session_id)?
            .events
            .pop()
            .ok_or(TrackerError::EmptyLog)?;
        self.writes += 1;
        Ok(removed)
    }

    fn end_session(&mut self, session_id: &str, ended_at: DateTime<Utc>) -> Result<Session> {
        self.check_online()?;
        let session = self.session_mut(session_id)?;
        session.ended_at = Some(ended_at);
        let ended = session.clone();
        self.writes += 1;
        Ok(ended)
    }

    fn active_session(&self, puzzle_id: &str) -> Result<Option<Session>> {
        self.check_online()?;
        Ok(self
            .sessions
            .iter()
            .find(|s| s.puzzle_id == puzzle_id && s.is_active())
            .cloned())
    }
}

impl PuzzleCatalog for MemoryStore {
    fn create_puzzle(&mut self, puzzle: &Puzzle) -> Result<()> {
        self.check_online()?;
        self.puzzles.push(puzzle.clone());
        self.writes += 1;
        Ok(())
    }

    fn puzzles(&self) -> Result<Vec<Puzzle>> {
        self.check_online()?;
        Ok(self.puzzles.clone())
    }

    fn puzzle(&self, id: &str) -> Result<Option<Puzzle>> {
        self.check_online()?;
        Ok(self.puzzles.iter().find(|p| p.id == id).cloned())
    }

    fn delete_puzzle(&mut self, id: &str) -> Result<()> {
        self.check_online()?;
        let before = self.puzzles.len();
        self.puzzles.retain(|p| p.id != id);
        if self.puzzles.len() == before {
            return Err(TrackerError::NotFound(format!("puzzle {id}")));
        }
        self.sessions.retain(|s| s.puzzle_id != id);
        self.writes += 1;
        Ok(())
    }

    fn sessions_for(&self, puzzle_id: &str) -> Result<Vec<Session>> {
        self.check_online()?;
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| s.puzzle_id == puzzle_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    fn delete_session(&mut self, session_id: &str) -> Result<()> {
        self.check_online()?;
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != session_id);
        if self.sessions.len() == before {
            return Err(TrackerError::NotFound(format!("session {session_id}")));
        }
        self.writes += 1;
        Ok(())
    }
}
