//! User actions during a sitting, and the key bindings that produce them.
//! Front ends translate input into an `Action` and hand it to `apply`;
//! nothing else touches the timer.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};

use crate::error::Result;
use crate::model::Event;
use crate::sitting::Sitting;
use crate::write_behind::WriteBehindQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pick,
    Place,
    Fail,
    TogglePause,
    Undo,
}

impl Action {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        match key.code {
            KeyCode::Char(' ') => Some(Action::Pick),
            KeyCode::Enter | KeyCode::Char('p') => Some(Action::Place),
            KeyCode::Char('f') => Some(Action::Fail),
            KeyCode::Char('b') => Some(Action::TogglePause),
            KeyCode::Char('u') => Some(Action::Undo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Picked,
    Recorded(Event),
    Paused,
    Resumed,
    Undone(Event),
}

pub fn apply(
    sitting: &mut Sitting,
    queue: &mut WriteBehindQueue,
    action: Action,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    match action {
        Action::Pick => sitting.pick(now).map(|_| Outcome::Picked),
        Action::Place => sitting.place(queue, now).map(Outcome::Recorded),
        Action::Fail => sitting.fail(queue, now).map(Outcome::Recorded),
        Action::TogglePause => {
            sitting.toggle_pause(now)?;
            Ok(if sitting.is_paused() {
                Outcome::Paused
            } else {
                Outcome::Resumed
            })
        }
        Action::Undo => sitting.undo(queue).map(Outcome::Undone),
    }
}
