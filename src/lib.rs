// Library surface for the binary, headless runs and integration tests.
// Terminal rendering stays in the binary.
pub mod action;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod export;
pub mod histogram;
pub mod model;
pub mod recovery;
pub mod runtime;
pub mod sitting;
pub mod stats;
pub mod store;
pub mod time_series;
pub mod timer;
pub mod util;
pub mod write_behind;

pub use error::{Result, TrackerError};
pub use model::{Event, EventKind, Puzzle, Session};
pub use sitting::Sitting;
