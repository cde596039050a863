//! Pause-aware session and piece clocks.
//!
//! Two accumulators are kept: `paused_ms` covers every pause since the
//! session started, `piece_paused_ms` only the pauses that overlapped the
//! piece currently held. A pause taken with empty hands therefore never
//! inflates the next piece's time.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::millis_between;
use crate::error::{Result, TrackerError};

/// Live timing state of one active session. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTimer {
    session_start: Option<DateTime<Utc>>,
    paused_ms: i64,
    piece_start: Option<DateTime<Utc>>,
    piece_paused_ms: i64,
    paused: bool,
    paused_at: Option<DateTime<Utc>>,
    last_piece_secs: Option<f64>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer for a session whose clock is already running from `session_start`,
    /// unpaused and with empty hands.
    pub fn resumed_from(session_start: DateTime<Utc>, last_piece_secs: Option<f64>) -> Self {
        Self {
            session_start: Some(session_start),
            last_piece_secs,
            ..Self::default()
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        *self = Self {
            session_start: Some(now),
            ..Self::default()
        };
        debug!(%now, "session timer started");
    }

    pub fn pick_piece(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_running("pick a piece")?;
        if self.piece_start.is_some() {
            return Err(TrackerError::invalid_state("a piece is already held"));
        }
        self.piece_start = Some(now);
        self.piece_paused_ms = 0;
        Ok(())
    }

    /// Ends the hold with a placement and returns the active seconds spent.
    pub fn place_piece(&mut self, now: DateTime<Utc>) -> Result<f64> {
        let elapsed = self.finish_piece(now)?;
        self.last_piece_secs = Some(elapsed);
        Ok(elapsed)
    }

    pub fn fail_piece(&mut self, now: DateTime<Utc>) -> Result<f64> {
        self.finish_piece(now)
    }

    fn finish_piece(&mut self, now: DateTime<Utc>) -> Result<f64> {
        self.ensure_running("finish a piece")?;
        let Some(piece_start) = self.piece_start else {
            return Err(TrackerError::invalid_state("no piece is held"));
        };
        let elapsed = to_secs(millis_between(piece_start, now) - self.piece_paused_ms);
        self.piece_start = None;
        self.piece_paused_ms = 0;
        Ok(elapsed)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.session_start.is_none() {
            return Err(TrackerError::invalid_state("no active session to pause"));
        }
        if self.paused {
            return Err(TrackerError::invalid_state("session is already paused"));
        }
        self.paused = true;
        self.paused_at = Some(now);
        debug!(%now, holding = self.is_holding(), "session paused");
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        let (true, Some(paused_at)) = (self.paused, self.paused_at) else {
            return Err(TrackerError::invalid_state("session is not paused"));
        };
        let pause_ms = millis_between(paused_at, now).max(0);
        self.paused_ms += pause_ms;
        if self.piece_start.is_some() {
            self.piece_paused_ms += pause_ms;
        }
        self.paused = false;
        self.paused_at = None;
        debug!(%now, pause_ms, "session resumed");
        Ok(())
    }

    /// Active seconds since the session started. Frozen while paused.
    pub fn session_elapsed(&self, now: DateTime<Utc>) -> f64 {
        let Some(start) = self.session_start else {
            return 0.0;
        };
        let until = if self.paused {
            self.paused_at.unwrap_or(now)
        } else {
            now
        };
        to_secs(millis_between(start, until) - self.paused_ms)
    }

    /// Active seconds on the held piece; `None` when nothing is held or paused.
    pub fn piece_elapsed(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.paused {
            return None;
        }
        self.piece_start
            .map(|start| to_secs(millis_between(start, now) - self.piece_paused_ms))
    }

    /// Closes the timer and returns the session's final active seconds.
    pub fn stop(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = self.session_elapsed(now);
        *self = Self::default();
        elapsed
    }

    pub fn is_running(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_holding(&self) -> bool {
        self.piece_start.is_some()
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn paused_total(&self) -> Duration {
        Duration::milliseconds(self.paused_ms)
    }

    /// Time of the most recent placement, for display.
    pub fn last_piece_secs(&self) -> Option<f64> {
        self.last_piece_secs
    }

    fn ensure_running(&self, action: &str) -> Result<()> {
        if self.session_start.is_none() {
            return Err(TrackerError::invalid_state(format!(
                "cannot {action}: no active session"
            )));
        }
        if self.paused {
            return Err(TrackerError::invalid_state(format!(
                "cannot {action} while paused"
            )));
        }
        Ok(())
    }
}

fn to_secs(ms: i64) -> f64 {
    ms.max(0) as f64 / 1000.0
}
