use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use piecemeal::action::{self, Action};
use piecemeal::clock::{Clock, ManualClock};
use piecemeal::runtime::{FixedTicker, Runner, TestEventSource, TrackerEvent};
use piecemeal::stats::PuzzleStats;
use piecemeal::store::{MemoryStore, PuzzleCatalog, SessionStore};
use piecemeal::write_behind::WriteBehindQueue;
use piecemeal::{EventKind, Puzzle, Sitting};

fn key(code: KeyCode) -> TrackerEvent {
    TrackerEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

// Drives a sitting through Runner/TestEventSource the way the terminal loop
// does, with the clock moved between keys.
#[test]
fn headless_sitting_excludes_breaks_from_piece_time() {
    let clock = ManualClock::at_epoch();
    let mut store = MemoryStore::new();
    let puzzle = Puzzle::new("Alps", 500, clock.now());
    store.create_puzzle(&puzzle).unwrap();
    let mut queue = WriteBehindQueue::default();
    let mut sitting = Sitting::begin(&puzzle, &store, &mut queue, clock.now()).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    // (key, seconds to advance before it)
    let script = [
        (KeyCode::Char(' '), 0),
        (KeyCode::Char('b'), 5),
        (KeyCode::Char('b'), 60),
        (KeyCode::Enter, 5),
        (KeyCode::Char(' '), 1),
        (KeyCode::Char('f'), 3),
    ];

    for (code, advance) in script {
        clock.advance_secs(advance);
        tx.send(key(code)).unwrap();
        match runner.step() {
            TrackerEvent::Key(k) => {
                let action = Action::from_key(&k).expect("bound key");
                action::apply(&mut sitting, &mut queue, action, clock.now()).unwrap();
            }
            other => panic!("expected a key, got {other:?}"),
        }
        // a tick between keys flushes like the live loop
        assert!(matches!(runner.step(), TrackerEvent::Tick));
        queue.flush(&mut store, clock.now());
    }

    let events = &sitting.session().events;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::PiecePlaced);
    assert_eq!(events[0].elapsed, 10.0);
    assert_eq!(events[1].kind, EventKind::PieceFailed);
    assert_eq!(events[1].elapsed, 3.0);
    assert_eq!(sitting.elapsed(clock.now()), 14.0);

    let stored = store.session(&sitting.session().id).unwrap();
    assert_eq!(stored.events, *events);
    assert!(queue.is_empty());
}

#[test]
fn headless_undo_then_stats() {
    let clock = ManualClock::at_epoch();
    let mut store = MemoryStore::new();
    let puzzle = Puzzle::new("Tulips", 100, clock.now());
    store.create_puzzle(&puzzle).unwrap();
    let mut queue = WriteBehindQueue::default();
    let mut sitting = Sitting::begin(&puzzle, &store, &mut queue, clock.now()).unwrap();

    for secs in [8, 12, 4] {
        sitting.pick(clock.now()).unwrap();
        clock.advance_secs(secs);
        sitting.place(&mut queue, clock.now()).unwrap();
    }
    let undone = sitting.undo(&mut queue).unwrap();
    assert_eq!(undone.elapsed, 4.0);

    let ended = sitting.end(&mut queue, clock.now());
    queue.drain(&mut store).into_result().unwrap();

    let sessions = store.sessions_for(&puzzle.id).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0], ended);
    assert!(store.active_session(&puzzle.id).unwrap().is_none());

    let stats = PuzzleStats::compute(&puzzle, &sessions);
    assert_eq!(stats.total_pieces_placed, 2);
    assert_eq!(stats.avg_time_per_piece, 10.0);
    assert_eq!(stats.progress, 2.0);
    assert_eq!(stats.pieces_remaining(), 98);
}
