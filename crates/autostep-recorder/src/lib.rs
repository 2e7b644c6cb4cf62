//! autostep-recorder - record desktop steps and play them back
//!
//! Captures mouse and keyboard activity as a timeline of
//! resolution-independent events, saves it as JSON, and replays it with the
//! original timing on any screen size, as many times as asked.
//!
//! ```rust,no_run
//! use autostep_recorder::prelude::*;
//! use std::sync::Arc;
//!
//! let storage = RecordingStorage::new()?;
//! let recording = storage.load("recording_20250101_120000.json")?;
//! let screen = Arc::new(FixedScreen::new(1920, 1080));
//! let session = PlaybackSession::new(recording, PlaybackOptions::new(3, 0.5), screen)?;
//! session.start(LogInjector::new(), |_mismatch| true)?;
//! let outcome = session.wait()?;
//! println!("{:?}", outcome.stats);
//! # Ok::<(), autostep_core::Error>(())
//! ```

pub mod events;
pub mod recorder;
pub mod replay;
pub mod storage;

pub use events::*;
pub use recorder::{RecorderConfig, RecordingSession, RecordingState, RecordingUpdate};
pub use replay::{
    PlaybackConfig, PlaybackOptions, PlaybackOutcome, PlaybackSession, PlaybackState,
    PlaybackUpdate, ReplayStats, ResolutionMismatch,
};
pub use storage::RecordingStorage;

pub mod prelude {
    pub use crate::events::*;
    pub use crate::recorder::{RecorderConfig, RecordingSession, RecordingState, RecordingUpdate};
    pub use crate::replay::{
        PlaybackConfig, PlaybackOptions, PlaybackOutcome, PlaybackSession, PlaybackState,
        PlaybackUpdate, ReplayStats, ResolutionMismatch,
    };
    pub use crate::storage::RecordingStorage;
    pub use autostep_core::prelude::*;
}
