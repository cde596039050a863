//! The explicit handle for the one session a user is working on.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::event_log;
use crate::model::{Event, EventKind, Puzzle, Session};
use crate::store::SessionStore;
use crate::timer::SessionTimer;
use crate::write_behind::{PendingWrite, WriteBehindQueue};

/// An active session plus its live timer. Every user action goes through here.
#[derive(Debug, Clone)]
pub struct Sitting {
    session: Session,
    timer: SessionTimer,
}

impl Sitting {
    /// Starts a fresh sitting. Refuses when the store already knows an active
    /// session for the puzzle; the caller must resolve that one first.
    pub fn begin<S: SessionStore + ?Sized>(
        puzzle: &Puzzle,
        store: &S,
        queue: &mut WriteBehindQueue,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if store.active_session(&puzzle.id)?.is_some() {
            return Err(TrackerError::ActiveSessionExists(puzzle.id.clone()));
        }
        let session = Session::new(puzzle.id.clone(), now);
        let mut timer = SessionTimer::new();
        timer.start(now);
        queue.push(PendingWrite::CreateSession(session.clone()));
        info!(puzzle = %puzzle.name, session = %session.id, "sitting started");
        Ok(Self { session, timer })
    }

    pub(crate) fn from_parts(session: Session, timer: SessionTimer) -> Self {
        Self { session, timer }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn pick(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.timer.pick_piece(now)
    }

    pub fn place(&mut self, queue: &mut WriteBehindQueue, now: DateTime<Utc>) -> Result<Event> {
        let elapsed = self.timer.place_piece(now)?;
        Ok(self.record(queue, EventKind::PiecePlaced, elapsed, now))
    }

    pub fn fail(&mut self, queue: &mut WriteBehindQueue, now: DateTime<Utc>) -> Result<Event> {
        let elapsed = self.timer.fail_piece(now)?;
        Ok(self.record(queue, EventKind::PieceFailed, elapsed, now))
    }

    fn record(&mut self, queue: &mut WriteBehindQueue, kind: EventKind, elapsed: f64, now: DateTime<Utc>) -> Event {
        let event = event_log::append(&mut self.session, kind, elapsed, now);
        queue.push(PendingWrite::AppendEvent {
            session_id: self.session.id.clone(),
            event: event.clone(),
        });
        event
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.timer.pause(now)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.timer.resume(now)
    }

    /// Pauses a running sitting or resumes a paused one.
    pub fn toggle_pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.timer.is_paused() {
            self.resume(now)
        } else {
            self.pause(now)
        }
    }

    /// Removes the most recent event. A held piece stays held, and undoing a
    /// failure does not hand the piece back: it has to be picked again.
    pub fn undo(&mut self, queue: &mut WriteBehindQueue) -> Result<Event> {
        let removed = event_log::undo_last(&mut self.session)?;
        queue.push(PendingWrite::UndoEvent {
            session_id: self.session.id.clone(),
        });
        Ok(removed)
    }

    /// Finalizes the session and returns it with `ended_at` set. Any piece
    /// still held is discarded.
    pub fn end(mut self, queue: &mut WriteBehindQueue, now: DateTime<Utc>) -> Session {
        let active_secs = self.timer.stop(now);
        self.session.ended_at = Some(now);
        queue.push(PendingWrite::EndSession {
            session_id: self.session.id.clone(),
            ended_at: now,
        });
        info!(
            session = %self.session.id,
            placed = self.placed(),
            failed = self.failed(),
            active_secs,
            "sitting ended"
        );
        self.session
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        self.timer.session_elapsed(now)
    }

    pub fn piece_elapsed(&self, now: DateTime<Utc>) -> Option<f64> {
        self.timer.piece_elapsed(now)
    }

    pub fn is_paused(&self) -> bool {
        self.timer.is_paused()
    }

    pub fn is_holding(&self) -> bool {
        self.timer.is_holding()
    }

    pub fn placed(&self) -> usize {
        self.session.placed_count()
    }

    pub fn failed(&self) -> usize {
        self.session.failed_count()
    }

    pub fn last_piece_secs(&self) -> Option<f64> {
        self.timer.last_piece_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::write_behind::RetryPolicy;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn begin() -> (Sitting, MemoryStore, WriteBehindQueue) {
        let store = MemoryStore::new();
        let mut queue = WriteBehindQueue::new(RetryPolicy::default());
        let puzzle = Puzzle::new("Lighthouse", 300, t(0));
        let sitting = Sitting::begin(&puzzle, &store, &mut queue, t(0)).unwrap();
        (sitting, store, queue)
    }

    #[test]
    fn place_records_event_and_queues_write() {
        let (mut sitting, mut store, mut queue) = begin();
        sitting.pick(t(1)).unwrap();
        let ev = sitting.place(&mut queue, t(9)).unwrap();
        assert_eq!(ev.elapsed, 8.0);
        assert_eq!(sitting.placed(), 1);
        assert_eq!(queue.len(), 2);

        queue.flush(&mut store, t(9));
        let stored = store.session(&sitting.session().id).unwrap();
        assert_eq!(stored.events, vec![ev]);
    }

    #[test]
    fn offline_store_does_not_block_actions() {
        let (mut sitting, mut store, mut queue) = begin();
        store.set_offline(true);
        sitting.pick(t(1)).unwrap();
        sitting.fail(&mut queue, t(4)).unwrap();
        assert!(queue.flush(&mut store, t(4)).into_result().is_err());
        assert_eq!(sitting.failed(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn undo_after_fail_leaves_hands_empty() {
        let (mut sitting, _store, mut queue) = begin();
        sitting.pick(t(1)).unwrap();
        sitting.fail(&mut queue, t(2)).unwrap();
        let removed = sitting.undo(&mut queue).unwrap();
        assert_eq!(removed.kind, EventKind::PieceFailed);
        assert!(!sitting.is_holding());
        assert_matches!(sitting.undo(&mut queue), Err(TrackerError::EmptyLog));
    }

    #[test]
    fn begin_refuses_when_puzzle_has_active_session() {
        let mut store = MemoryStore::new();
        let puzzle = Puzzle::new("Lighthouse", 300, t(0));
        store
            .create_session(&Session::new(puzzle.id.clone(), t(0)))
            .unwrap();
        let mut queue = WriteBehindQueue::default();
        assert_matches!(
            Sitting::begin(&puzzle, &store, &mut queue, t(5)),
            Err(TrackerError::ActiveSessionExists(_))
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn end_sets_ended_at_and_queues() {
        let (mut sitting, mut store, mut queue) = begin();
        sitting.toggle_pause(t(10)).unwrap();
        assert!(sitting.is_paused());
        sitting.toggle_pause(t(20)).unwrap();
        assert_eq!(sitting.elapsed(t(25)), 15.0);

        let session = sitting.end(&mut queue, t(30));
        assert_eq!(session.ended_at, Some(t(30)));
        queue.flush(&mut store, t(30));
        assert_eq!(store.active_session(&session.puzzle_id).unwrap(), None);
    }
}
