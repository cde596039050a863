use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{PuzzleCatalog, SessionStore};
use crate::app_dirs::AppDirs;
use crate::error::{Result, TrackerError};
use crate::model::{Event, EventKind, Puzzle, Session};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS puzzles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        total_pieces INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        puzzle_id TEXT NOT NULL REFERENCES puzzles(id),
        started_at TEXT NOT NULL,
        ended_at TEXT
    );

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        kind TEXT NOT NULL,
        elapsed REAL NOT NULL,
        timestamp TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_puzzle ON sessions(puzzle_id);
    CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
        ON sessions(puzzle_id) WHERE ended_at IS NULL;
"#;

/// SQLite-backed puzzle and session store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at the default state location, creating it if needed
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("piecemeal.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened puzzle database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn })
    }

    fn load_events(&self, session_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, elapsed, timestamp FROM events WHERE session_id = ?1 ORDER BY id",
        )?;
        let events = stmt
            .query_map([session_id], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, puzzle_id, started_at, ended_at FROM sessions WHERE id = ?1",
                [session_id],
                session_from_row,
            )
            .optional()?;
        self.with_events(session)
    }

    fn with_events(&self, session: Option<Session>) -> Result<Option<Session>> {
        match session {
            Some(mut s) => {
                s.events = self.load_events(&s.id)?;
                Ok(Some(s))
            }
            None => Ok(None),
        }
    }

    fn ensure_session(&self, session_id: &str) -> Result<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            [session_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(TrackerError::NotFound(format!("session {session_id}")))
        }
    }
}

impl SessionStore for SqliteStore {
    fn create_session(&mut self, session: &Session) -> Result<()> {
        if self.active_session(&session.puzzle_id)?.is_some() {
            return Err(TrackerError::ActiveSessionExists(session.puzzle_id.clone()));
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, puzzle_id, started_at, ended_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.puzzle_id,
                fmt_ts(session.started_at),
                session.ended_at.map(fmt_ts),
            ],
        )?;
        for event in &session.events {
            insert_event(&tx, &session.id, event)?;
        }
        tx.commit()?;
        debug!(session = %session.id, "session stored");
        Ok(())
    }

    fn append_event(&mut self, session_id: &str, event: &Event) -> Result<Event> {
        self.ensure_session(session_id)?;
        insert_event(&self.conn, session_id, event)?;
        Ok(event.clone())
    }

    fn undo_event(&mut self, session_id: &str) -> Result<Event> {
        self.ensure_session(session_id)?;
        let tx = self.conn.transaction()?;
        let last = tx
            .query_row(
                "SELECT id, kind, elapsed, timestamp FROM events
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT 1",
                [session_id],
                |row| {
                    let id: i64 = row.get(0)?;
                    let kind = parse_kind(row, 1)?;
                    Ok((
                        id,
                        Event {
                            kind,
                            elapsed: row.get(2)?,
                            timestamp: parse_opt_ts(row, 3)?,
                        },
                    ))
                },
            )
            .optional()?;
        let Some((id, event)) = last else {
            return Err(TrackerError::EmptyLog);
        };
        tx.execute("DELETE FROM events WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(event)
    }

    fn end_session(&mut self, session_id: &str, ended_at: DateTime<Utc>) -> Result<Session> {
        let updated = self.conn.execute(
            "UPDATE sessions SET ended_at = ?1 WHERE id = ?2",
            params![fmt_ts(ended_at), session_id],
        )?;
        if updated == 0 {
            return Err(TrackerError::NotFound(format!("session {session_id}")));
        }
        self.load_session(session_id)?
            .ok_or_else(|| TrackerError::NotFound(format!("session {session_id}")))
    }

    fn active_session(&self, puzzle_id: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, puzzle_id, started_at, ended_at FROM sessions
                 WHERE puzzle_id = ?1 AND ended_at IS NULL LIMIT 1",
                [puzzle_id],
                session_from_row,
            )
            .optional()?;
        self.with_events(session)
    }
}

impl PuzzleCatalog for SqliteStore {
    fn create_puzzle(&mut self, puzzle: &Puzzle) -> Result<()> {
        self.conn.execute(
            "INSERT INTO puzzles (id, name, total_pieces, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                puzzle.id,
                puzzle.name,
                puzzle.total_pieces,
                fmt_ts(puzzle.created_at)
            ],
        )?;
        Ok(())
    }

    fn puzzles(&self) -> Result<Vec<Puzzle>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, total_pieces, created_at FROM puzzles ORDER BY created_at",
        )?;
        let puzzles = stmt
            .query_map([], puzzle_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(puzzles)
    }

    fn puzzle(&self, id: &str) -> Result<Option<Puzzle>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, total_pieces, created_at FROM puzzles WHERE id = ?1",
                [id],
                puzzle_from_row,
            )
            .optional()?)
    }

    fn delete_puzzle(&mut self, id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM events WHERE session_id IN (SELECT id FROM sessions WHERE puzzle_id = ?1)",
            [id],
        )?;
        tx.execute("DELETE FROM sessions WHERE puzzle_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM puzzles WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(TrackerError::NotFound(format!("puzzle {id}")));
        }
        tx.commit()?;
        Ok(())
    }

    fn sessions_for(&self, puzzle_id: &str) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, puzzle_id, started_at, ended_at FROM sessions
             WHERE puzzle_id = ?1 ORDER BY started_at",
        )?;
        let sessions = stmt
            .query_map([puzzle_id], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut loaded = Vec::with_capacity(sessions.len());
        for mut session in sessions {
            session.events = self.load_events(&session.id)?;
            loaded.push(session);
        }
        Ok(loaded)
    }

    fn delete_session(&mut self, session_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM events WHERE session_id = ?1", [session_id])?;
        let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
        if deleted == 0 {
            return Err(TrackerError::NotFound(format!("session {session_id}")));
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_event(conn: &Connection, session_id: &str, event: &Event) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO events (session_id, kind, elapsed, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![
            session_id,
            event.kind.to_string(),
            event.elapsed,
            event.timestamp.map(fmt_ts),
        ],
    )
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(&raw, idx))
        .transpose()
}

fn parse_kind(row: &Row, idx: usize) -> rusqlite::Result<EventKind> {
    let raw: String = row.get(idx)?;
    EventKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, "kind".to_string(), rusqlite::types::Type::Text)
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        kind: parse_kind(row, 0)?,
        elapsed: row.get(1)?,
        timestamp: parse_opt_ts(row, 2)?,
    })
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let started_at: String = row.get(2)?;
    Ok(Session {
        id: row.get(0)?,
        puzzle_id: row.get(1)?,
        started_at: parse_ts(&started_at, 2)?,
        ended_at: parse_opt_ts(row, 3)?,
        events: Vec::new(),
    })
}

fn puzzle_from_row(row: &Row) -> rusqlite::Result<Puzzle> {
    let created_at: String = row.get(3)?;
    Ok(Puzzle {
        id: row.get(0)?,
        name: row.get(1)?,
        total_pieces: row.get(2)?,
        created_at: parse_ts(&created_at, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use tempfile::tempdir;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn store_with_puzzle() -> (SqliteStore, Puzzle) {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let puzzle = Puzzle::new("Night Harbor", 1000, t(0));
        store.create_puzzle(&puzzle).unwrap();
        (store, puzzle)
    }

    #[test]
    fn puzzle_round_trip() {
        let (store, puzzle) = store_with_puzzle();
        assert_eq!(store.puzzle(&puzzle.id).unwrap(), Some(puzzle.clone()));
        assert_eq!(store.puzzles().unwrap(), vec![puzzle]);
    }

    #[test]
    fn events_keep_order_and_timestamps() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(10));
        store.create_session(&session).unwrap();

        let placed = Event::new(EventKind::PiecePlaced, 12.25, t(22));
        let failed = Event {
            kind: EventKind::PieceFailed,
            elapsed: 3.0,
            timestamp: None,
        };
        store.append_event(&session.id, &placed).unwrap();
        store.append_event(&session.id, &failed).unwrap();

        let active = store.active_session(&puzzle.id).unwrap().unwrap();
        assert_eq!(active.events, vec![placed, failed]);
    }

    #[test]
    fn second_active_session_rejected() {
        let (mut store, puzzle) = store_with_puzzle();
        store
            .create_session(&Session::new(puzzle.id.clone(), t(1)))
            .unwrap();
        assert_matches!(
            store.create_session(&Session::new(puzzle.id.clone(), t(2))),
            Err(TrackerError::ActiveSessionExists(_))
        );
    }

    #[test]
    fn undo_removes_only_last_event() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&session).unwrap();
        for secs in [1.0, 2.0, 3.0] {
            store
                .append_event(&session.id, &Event::new(EventKind::PiecePlaced, secs, t(5)))
                .unwrap();
        }
        assert_eq!(store.undo_event(&session.id).unwrap().elapsed, 3.0);
        assert_eq!(store.undo_event(&session.id).unwrap().elapsed, 2.0);
        let remaining = store.active_session(&puzzle.id).unwrap().unwrap();
        assert_eq!(remaining.events.len(), 1);
    }

    #[test]
    fn undo_on_empty_session() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&session).unwrap();
        assert_matches!(store.undo_event(&session.id), Err(TrackerError::EmptyLog));
        assert_matches!(store.undo_event("missing"), Err(TrackerError::NotFound(_)));
    }

    #[test]
    fn end_session_clears_active() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&session).unwrap();
        let ended = store.end_session(&session.id, t(3600)).unwrap();
        assert_eq!(ended.ended_at, Some(t(3600)));
        assert_eq!(store.active_session(&puzzle.id).unwrap(), None);
        // a new sitting can start once the previous one ended
        store
            .create_session(&Session::new(puzzle.id.clone(), t(4000)))
            .unwrap();
        assert_eq!(store.sessions_for(&puzzle.id).unwrap().len(), 2);
    }

    #[test]
    fn delete_puzzle_cascades() {
        let (mut store, puzzle) = store_with_puzzle();
        let session = Session::new(puzzle.id.clone(), t(0));
        store.create_session(&session).unwrap();
        store
            .append_event(&session.id, &Event::new(EventKind::PiecePlaced, 1.0, t(1)))
            .unwrap();
        store.delete_puzzle(&puzzle.id).unwrap();
        assert_eq!(store.puzzle(&puzzle.id).unwrap(), None);
        assert!(store.sessions_for(&puzzle.id).unwrap().is_empty());
        assert_matches!(store.delete_session(&session.id), Err(TrackerError::NotFound(_)));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("puzzles.db");
        let puzzle = Puzzle::new("Alps", 500, t(0));
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.create_puzzle(&puzzle).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.puzzle(&puzzle.id).unwrap(), Some(puzzle));
    }
}
