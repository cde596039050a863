//! Write-behind persistence. User actions mutate the in-memory session
//! first and enqueue the matching store call here; the tick loop flushes.
//!
//! The queue is strictly FIFO: a failing head blocks everything behind it,
//! so an undo is never applied before the append it cancels.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, error, warn};

use crate::error::TrackerError;
use crate::model::{Event, Session};
use crate::store::SessionStore;

/// Exponential backoff between attempts at the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::milliseconds(500),
            max_delay: Duration::seconds(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempts`-th consecutive failure: base, 2x, 4x, ... capped.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let shift = attempts.saturating_sub(1).min(20);
        let factor = 1i32 << shift;
        let delay = self.base_delay * factor;
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    CreateSession(Session),
    AppendEvent { session_id: String, event: Event },
    UndoEvent { session_id: String },
    EndSession { session_id: String, ended_at: DateTime<Utc> },
}

impl PendingWrite {
    fn apply<S: SessionStore + ?Sized>(&self, store: &mut S) -> Result<(), TrackerError> {
        match self {
            PendingWrite::CreateSession(session) => store.create_session(session),
            PendingWrite::AppendEvent { session_id, event } => {
                store.append_event(session_id, event).map(|_| ())
            }
            PendingWrite::UndoEvent { session_id } => store.undo_event(session_id).map(|_| ()),
            PendingWrite::EndSession {
                session_id,
                ended_at,
            } => store.end_session(session_id, *ended_at).map(|_| ()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PendingWrite::CreateSession(_) => "create_session",
            PendingWrite::AppendEvent { .. } => "append_event",
            PendingWrite::UndoEvent { .. } => "undo_event",
            PendingWrite::EndSession { .. } => "end_session",
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedWrite {
    op: PendingWrite,
    attempts: u32,
    next_attempt: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// What one flush achieved.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FlushReport {
    pub applied: usize,
    pub rejected: usize,
    pub pending: usize,
    /// Set when the flush stopped on a retryable failure.
    pub unavailable: Option<String>,
}

impl FlushReport {
    pub fn into_result(self) -> Result<FlushReport, TrackerError> {
        match &self.unavailable {
            Some(msg) => Err(TrackerError::PersistenceUnavailable(msg.clone())),
            None => Ok(self),
        }
    }
}

#[derive(Debug, Default)]
pub struct WriteBehindQueue {
    queue: VecDeque<QueuedWrite>,
    policy: RetryPolicy,
}

impl WriteBehindQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            queue: VecDeque::new(),
            policy,
        }
    }

    pub fn push(&mut self, op: PendingWrite) {
        debug!(op = op.label(), queued = self.queue.len() + 1, "write queued");
        self.queue.push_back(QueuedWrite {
            op,
            attempts: 0,
            next_attempt: None,
            last_error: None,
        });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingWrite> {
        self.queue.iter().map(|q| &q.op)
    }

    /// Last failure seen at the head of the queue, if it is still waiting.
    pub fn last_error(&self) -> Option<&str> {
        self.queue.front().and_then(|q| q.last_error.as_deref())
    }

    /// Applies due writes in order, stopping at the first retryable failure.
    /// Writes the store can never accept (unknown session, nothing to undo)
    /// are logged and discarded.
    pub fn flush<S: SessionStore + ?Sized>(&mut self, store: &mut S, now: DateTime<Utc>) -> FlushReport {
        self.run(store, Some(now))
    }

    /// Flush ignoring backoff deadlines, for shutdown.
    pub fn drain<S: SessionStore + ?Sized>(&mut self, store: &mut S) -> FlushReport {
        self.run(store, None)
    }

    fn run<S: SessionStore + ?Sized>(&mut self, store: &mut S, now: Option<DateTime<Utc>>) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(head) = self.queue.front_mut() {
            if let (Some(now), Some(due)) = (now, head.next_attempt) {
                if now < due {
                    break;
                }
            }

            match head.op.apply(store) {
                Ok(()) => {
                    debug!(op = head.op.label(), attempts = head.attempts + 1, "write applied");
                    self.queue.pop_front();
                    report.applied += 1;
                }
                Err(err) if err.is_transient() => {
                    head.attempts += 1;
                    let delay = self.policy.delay_after(head.attempts);
                    head.next_attempt = now.map(|n| n + delay);
                    head.last_error = Some(err.to_string());
                    warn!(
                        op = head.op.label(),
                        attempts = head.attempts,
                        retry_in_ms = delay.num_milliseconds(),
                        error = %err,
                        "store write failed, will retry"
                    );
                    report.unavailable = Some(err.to_string());
                    break;
                }
                Err(err) => {
                    error!(op = head.op.label(), error = %err, "store rejected write, dropping it");
                    self.queue.pop_front();
                    report.rejected += 1;
                }
            }
        }

        report.pending = self.queue.len();
        report
    }
}
