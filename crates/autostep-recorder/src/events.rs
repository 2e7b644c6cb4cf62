//! Event model for recorded steps
//!
//! Events serialize to flat JSON objects tagged by `type`, carrying only the
//! fields that matter for their kind.

use autostep_core::{Button, Key, Resolution};
use serde::{Deserialize, Serialize};

/// A finished recording: the screen it was captured on plus its timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    #[serde(rename = "screen_width")]
    pub capture_width: u32,
    #[serde(rename = "screen_height")]
    pub capture_height: u32,
    pub events: Vec<RecordedEvent>,
}

impl RecordingMetadata {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            capture_width: resolution.width,
            capture_height: resolution.height,
            events: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.capture_width, self.capture_height)
    }

    /// Offset of the last event in seconds
    pub fn duration(&self) -> f64 {
        self.events.last().map(|e| e.offset).unwrap_or(0.0)
    }

    pub fn summary(&self) -> EventSummary {
        let mut s = EventSummary::default();
        for e in &self.events {
            match e.kind() {
                EventKind::MouseMove => s.moves += 1,
                EventKind::MouseButton => s.buttons += 1,
                EventKind::KeyDown => s.key_downs += 1,
                EventKind::KeyUp => s.key_ups += 1,
            }
        }
        s
    }
}

/// Per-kind event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub moves: usize,
    pub buttons: usize,
    pub key_downs: usize,
    pub key_ups: usize,
}

/// One captured action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Seconds since the recording started, pauses excluded
    #[serde(rename = "time")]
    pub offset: f64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "mouse_move")]
    MouseMove { nx: f64, ny: f64 },

    #[serde(rename = "mouse_click")]
    MouseButton {
        nx: f64,
        ny: f64,
        button: Button,
        pressed: bool,
    },

    #[serde(rename = "key_press")]
    KeyDown { key: Key },

    #[serde(rename = "key_release")]
    KeyUp { key: Key },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MouseMove,
    MouseButton,
    KeyDown,
    KeyUp,
}

impl RecordedEvent {
    pub fn new(offset: f64, action: Action) -> Self {
        Self { offset, action }
    }

    pub fn kind(&self) -> EventKind {
        match self.action {
            Action::MouseMove { .. } => EventKind::MouseMove,
            Action::MouseButton { .. } => EventKind::MouseButton,
            Action::KeyDown { .. } => EventKind::KeyDown,
            Action::KeyUp { .. } => EventKind::KeyUp,
        }
    }

    /// Normalized pointer position, for pointer events
    pub fn position(&self) -> Option<(f64, f64)> {
        match self.action {
            Action::MouseMove { nx, ny } | Action::MouseButton { nx, ny, .. } => Some((nx, ny)),
            _ => None,
        }
    }
}
