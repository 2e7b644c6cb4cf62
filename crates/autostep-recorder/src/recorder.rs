//! Recording session: turns raw hook events into a normalized timeline
//!
//! `Idle -> ArmCountdown -> Active <-> Paused -> Stopped`
//!
//! The session is a cheap cloneable handle. Hook threads call
//! [`RecordingSession::handle`] while the control thread drives the state
//! machine; both go through the same mutex.
//!
//! Offsets exclude time spent paused: the event after a resume continues
//! the timeline where the pause began.

use crate::events::{Action, RecordedEvent, RecordingMetadata};
use autostep_core::{
    Error, InputHook, InputSink, Key, NamedKey, RawInput, Resolution, Result, ScreenMetrics,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Only one recording may be armed per process
static RECORDING_SLOT: AtomicBool = AtomicBool::new(false);

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Lead-in before capture starts
    pub countdown: Duration,
    /// Pressing this key stops the recording
    pub stop_key: Key,
    /// Pressing this key pauses or resumes the recording
    pub pause_key: Key,
    /// How often the countdown checks for cancellation
    pub tick: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            stop_key: Key::Named(NamedKey::Escape),
            pause_key: Key::Named(NamedKey::F(9)),
            tick: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    ArmCountdown,
    Active,
    Paused,
    Stopped,
}

/// Notifications for whoever drives the session
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingUpdate {
    State(RecordingState),
    /// Sent exactly once, when the session stops
    Finished(RecordingMetadata),
}

struct Inner {
    state: RecordingState,
    resolution: Resolution,
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    last_offset: f64,
    events: Vec<RecordedEvent>,
    dropped: usize,
    holds_slot: bool,
}

struct Shared {
    config: RecorderConfig,
    screen: Arc<dyn ScreenMetrics>,
    inner: Mutex<Inner>,
    tx: Sender<RecordingUpdate>,
    rx: Receiver<RecordingUpdate>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if self.inner.get_mut().holds_slot {
            RECORDING_SLOT.store(false, Ordering::SeqCst);
        }
    }
}

#[derive(Clone)]
pub struct RecordingSession {
    shared: Arc<Shared>,
}

impl RecordingSession {
    pub fn new(screen: Arc<dyn ScreenMetrics>) -> Self {
        Self::with_config(screen, RecorderConfig::default())
    }

    pub fn with_config(screen: Arc<dyn ScreenMetrics>, config: RecorderConfig) -> Self {
        let (tx, rx) = unbounded();
        Self {
            shared: Arc::new(Shared {
                config,
                screen,
                inner: Mutex::new(Inner {
                    state: RecordingState::Idle,
                    resolution: Resolution::new(0, 0),
                    started: None,
                    paused_at: None,
                    paused_total: Duration::ZERO,
                    last_offset: 0.0,
                    events: Vec::new(),
                    dropped: 0,
                    holds_slot: false,
                }),
                tx,
                rx,
            }),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.shared.config
    }

    pub fn state(&self) -> RecordingState {
        self.shared.inner.lock().state
    }

    pub fn event_count(&self) -> usize {
        self.shared.inner.lock().events.len()
    }

    /// Receiver for state changes and the finished recording
    pub fn updates(&self) -> Receiver<RecordingUpdate> {
        self.shared.rx.clone()
    }

    /// Idle -> ArmCountdown
    pub fn arm(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordingState::Idle {
            return Err(Error::invalid_state("arm recording", inner.state));
        }
        if RECORDING_SLOT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::concurrent_session("recording"));
        }
        inner.holds_slot = true;
        self.set_state(&mut inner, RecordingState::ArmCountdown);
        Ok(())
    }

    /// ArmCountdown -> Idle, nothing recorded
    pub fn cancel_countdown(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordingState::ArmCountdown {
            return Err(Error::invalid_state("cancel countdown", inner.state));
        }
        self.release(&mut inner);
        self.set_state(&mut inner, RecordingState::Idle);
        Ok(())
    }

    /// Sit out the lead-in, then start capturing.
    ///
    /// Returns `false` if the countdown was cancelled meanwhile.
    pub fn wait_countdown(&self) -> Result<bool> {
        let deadline = Instant::now() + self.shared.config.countdown;
        loop {
            if self.state() != RecordingState::ArmCountdown {
                return Ok(false);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.shared.config.tick.min(deadline - now));
        }
        match self.begin() {
            Ok(()) => Ok(true),
            Err(_) if self.state() != RecordingState::ArmCountdown => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// ArmCountdown -> Active. Freezes the current screen size for the session.
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordingState::ArmCountdown {
            return Err(Error::invalid_state("begin recording", inner.state));
        }
        let resolution = self.shared.screen.resolution()?;
        if !resolution.is_valid() {
            return Err(Error::invalid_parameter(
                "screen size",
                &format!("{} is not a usable resolution", resolution),
            ));
        }
        inner.resolution = resolution;
        inner.started = Some(Instant::now());
        inner.paused_at = None;
        inner.paused_total = Duration::ZERO;
        inner.last_offset = 0.0;
        inner.events.clear();
        inner.dropped = 0;
        tracing::info!(%resolution, "recording started");
        self.set_state(&mut inner, RecordingState::Active);
        Ok(())
    }

    /// Sink to hand to an [`InputHook`]
    pub fn sink(&self) -> InputSink {
        let session = self.clone();
        Arc::new(move |input| session.handle(input))
    }

    /// Start `hook` feeding this session
    pub fn attach(&self, hook: &mut dyn InputHook) -> Result<()> {
        hook.start(self.sink())
    }

    /// Hook callback. Safe to call from any thread, in any state.
    pub fn handle(&self, input: RawInput) {
        let mut inner = self.shared.inner.lock();
        if !matches!(inner.state, RecordingState::Active | RecordingState::Paused) {
            return;
        }

        if let RawInput::Key { key, pressed } = &input {
            if *key == self.shared.config.stop_key {
                if *pressed {
                    self.finish(&mut inner);
                }
                return;
            }
            if *key == self.shared.config.pause_key {
                if *pressed {
                    self.toggle(&mut inner);
                }
                return;
            }
        }

        if inner.state == RecordingState::Paused {
            inner.dropped += 1;
            return;
        }

        let offset = Self::offset(&mut inner);
        let resolution = inner.resolution;
        let action = match input {
            RawInput::Move { x, y } => {
                let (nx, ny) = clamp_unit(resolution.normalize(x, y));
                Action::MouseMove { nx, ny }
            }
            RawInput::Button { x, y, button, pressed } => {
                let (nx, ny) = clamp_unit(resolution.normalize(x, y));
                Action::MouseButton { nx, ny, button, pressed }
            }
            RawInput::Key { key, pressed: true } => Action::KeyDown { key },
            RawInput::Key { key, pressed: false } => Action::KeyUp { key },
        };
        inner.events.push(RecordedEvent::new(offset, action));
    }

    pub fn pause(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordingState::Active {
            return Err(Error::invalid_state("pause recording", inner.state));
        }
        self.toggle(&mut inner);
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordingState::Paused {
            return Err(Error::invalid_state("resume recording", inner.state));
        }
        self.toggle(&mut inner);
        Ok(())
    }

    pub fn toggle_pause(&self) -> Result<RecordingState> {
        let mut inner = self.shared.inner.lock();
        if !matches!(inner.state, RecordingState::Active | RecordingState::Paused) {
            return Err(Error::invalid_state("toggle pause", inner.state));
        }
        self.toggle(&mut inner);
        Ok(inner.state)
    }

    /// Active/Paused -> Stopped. The recording arrives as
    /// [`RecordingUpdate::Finished`].
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if !matches!(inner.state, RecordingState::Active | RecordingState::Paused) {
            return Err(Error::invalid_state("stop recording", inner.state));
        }
        self.finish(&mut inner);
        Ok(())
    }

    /// Active/Paused -> Idle, throwing the captured events away
    pub fn discard(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if !matches!(inner.state, RecordingState::Active | RecordingState::Paused) {
            return Err(Error::invalid_state("discard recording", inner.state));
        }
        let dropped = std::mem::take(&mut inner.events).len();
        inner.started = None;
        self.release(&mut inner);
        tracing::info!(dropped, "recording discarded");
        self.set_state(&mut inner, RecordingState::Idle);
        Ok(())
    }

    /// Block until the finished recording arrives or `timeout` passes
    pub fn wait_finished(&self, timeout: Duration) -> Option<RecordingMetadata> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.checked_duration_since(Instant::now())?;
            match self.shared.rx.recv_timeout(left) {
                Ok(RecordingUpdate::Finished(m)) => return Some(m),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    fn toggle(&self, inner: &mut Inner) {
        let now = Instant::now();
        match inner.state {
            RecordingState::Active => {
                inner.paused_at = Some(now);
                tracing::info!("recording paused");
                self.set_state(inner, RecordingState::Paused);
            }
            RecordingState::Paused => {
                if let Some(at) = inner.paused_at.take() {
                    inner.paused_total += now - at;
                }
                tracing::info!(dropped = inner.dropped, "recording resumed");
                self.set_state(inner, RecordingState::Active);
            }
            _ => {}
        }
    }

    fn finish(&self, inner: &mut Inner) {
        let metadata = RecordingMetadata {
            capture_width: inner.resolution.width,
            capture_height: inner.resolution.height,
            events: std::mem::take(&mut inner.events),
        };
        self.release(inner);
        tracing::info!(
            events = metadata.events.len(),
            duration = metadata.duration(),
            "recording stopped"
        );
        self.set_state(inner, RecordingState::Stopped);
        let _ = self.shared.tx.send(RecordingUpdate::Finished(metadata));
    }

    fn offset(inner: &mut Inner) -> f64 {
        let elapsed = inner
            .started
            .map(|s| s.elapsed().saturating_sub(inner.paused_total))
            .unwrap_or_default();
        let offset = elapsed.as_secs_f64().max(inner.last_offset);
        inner.last_offset = offset;
        offset
    }

    fn release(&self, inner: &mut Inner) {
        if inner.holds_slot {
            inner.holds_slot = false;
            RECORDING_SLOT.store(false, Ordering::SeqCst);
        }
    }

    fn set_state(&self, inner: &mut Inner, state: RecordingState) {
        inner.state = state;
        let _ = self.shared.tx.send(RecordingUpdate::State(state));
    }
}

fn clamp_unit((nx, ny): (f64, f64)) -> (f64, f64) {
    (nx.clamp(0.0, 1.0), ny.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autostep_core::platform::headless::FixedScreen;
    use autostep_core::Button;

    /// Recording sessions share a process-wide slot; tests that arm one
    /// must not overlap.
    static SERIAL: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn session() -> RecordingSession {
        RecordingSession::with_config(
            Arc::new(FixedScreen::new(1000, 500)),
            RecorderConfig {
                countdown: Duration::ZERO,
                ..Default::default()
            },
        )
    }

    fn key(c: char, pressed: bool) -> RawInput {
        RawInput::Key { key: Key::Char(c), pressed }
    }

    fn active() -> RecordingSession {
        let s = session();
        s.arm().unwrap();
        assert!(s.wait_countdown().unwrap());
        s
    }

    #[test]
    fn captures_normalized_events() {
        let _g = SERIAL.lock();
        let s = active();
        s.handle(RawInput::Move { x: 250.0, y: 250.0 });
        s.handle(RawInput::Button { x: 1000.0, y: 0.0, button: Button::Right, pressed: true });
        s.handle(key('a', true));
        s.handle(key('a', false));
        s.stop().unwrap();

        let m = s.wait_finished(Duration::from_secs(1)).unwrap();
        assert_eq!((m.capture_width, m.capture_height), (1000, 500));
        assert_eq!(m.events[0].action, Action::MouseMove { nx: 0.25, ny: 0.5 });
        assert_eq!(
            m.events[1].action,
            Action::MouseButton { nx: 1.0, ny: 0.0, button: Button::Right, pressed: true }
        );
        assert_eq!(m.events[2].action, Action::KeyDown { key: Key::Char('a') });
        assert_eq!(m.events[3].action, Action::KeyUp { key: Key::Char('a') });
    }

    #[test]
    fn offsets_never_decrease() {
        let _g = SERIAL.lock();
        let s = active();
        for i in 0..50 {
            s.handle(RawInput::Move { x: i as f64, y: 0.0 });
        }
        s.stop().unwrap();
        let m = s.wait_finished(Duration::from_secs(1)).unwrap();
        assert!(m.events[0].offset >= 0.0);
        assert!(m.events.windows(2).all(|w| w[0].offset <= w[1].offset));
    }

    #[test]
    fn out_of_screen_positions_are_clamped() {
        let _g = SERIAL.lock();
        let s = active();
        s.handle(RawInput::Move { x: -40.0, y: 900.0 });
        s.stop().unwrap();
        let m = s.wait_finished(Duration::from_secs(1)).unwrap();
        assert_eq!(m.events[0].action, Action::MouseMove { nx: 0.0, ny: 1.0 });
    }

    #[test]
    fn pause_drops_events_and_excludes_pause_time() {
        let _g = SERIAL.lock();
        let s = active();
        s.handle(key('a', true));
        s.handle(RawInput::Key { key: Key::Named(NamedKey::F(9)), pressed: true });
        assert_eq!(s.state(), RecordingState::Paused);
        s.handle(key('b', true));
        thread::sleep(Duration::from_millis(300));
        s.handle(RawInput::Key { key: Key::Named(NamedKey::F(9)), pressed: false });
        s.resume().unwrap();
        s.handle(key('c', true));
        s.stop().unwrap();

        let m = s.wait_finished(Duration::from_secs(1)).unwrap();
        assert_eq!(m.events.len(), 2);
        assert_eq!(m.events[1].action, Action::KeyDown { key: Key::Char('c') });
        assert!(m.events[1].offset - m.events[0].offset < 0.2);
    }

    #[test]
    fn stop_key_finishes_once_and_is_not_recorded() {
        let _g = SERIAL.lock();
        let s = active();
        s.handle(key('x', true));
        s.handle(RawInput::Key { key: Key::Named(NamedKey::Escape), pressed: true });
        assert_eq!(s.state(), RecordingState::Stopped);
        s.handle(key('y', true));
        assert!(s.stop().is_err());

        let updates = s.updates();
        let finished: Vec<_> = updates
            .try_iter()
            .filter_map(|u| match u {
                RecordingUpdate::Finished(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].events.len(), 1);
    }

    #[test]
    fn events_before_start_are_ignored() {
        let _g = SERIAL.lock();
        let s = session();
        s.handle(key('a', true));
        s.arm().unwrap();
        s.handle(key('b', true));
        s.begin().unwrap();
        assert_eq!(s.event_count(), 0);
        s.discard().unwrap();
    }

    #[test]
    fn cancelled_countdown_returns_to_idle() {
        let _g = SERIAL.lock();
        let s = RecordingSession::with_config(
            Arc::new(FixedScreen::new(10, 10)),
            RecorderConfig {
                countdown: Duration::from_secs(10),
                ..Default::default()
            },
        );
        s.arm().unwrap();
        let waiter = {
            let s = s.clone();
            thread::spawn(move || s.wait_countdown().unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        s.cancel_countdown().unwrap();
        assert!(!waiter.join().unwrap());
        assert_eq!(s.state(), RecordingState::Idle);
        assert!(s.wait_finished(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn second_session_is_rejected() {
        let _g = SERIAL.lock();
        let first = active();
        let second = session();
        let err = second.arm().unwrap_err();
        assert_eq!(err.code, autostep_core::ErrorCode::ConcurrentSessionConflict);
        first.stop().unwrap();
        second.arm().unwrap();
        second.cancel_countdown().unwrap();
    }

    #[test]
    fn discard_then_rearm() {
        let _g = SERIAL.lock();
        let s = active();
        s.handle(key('a', true));
        s.discard().unwrap();
        assert_eq!(s.state(), RecordingState::Idle);
        s.arm().unwrap();
        s.begin().unwrap();
        assert_eq!(s.event_count(), 0);
        s.stop().unwrap();
        assert!(s.wait_finished(Duration::from_secs(1)).unwrap().events.is_empty());
    }

    #[test]
    fn scripted_hook_feeds_session() {
        use autostep_core::platform::headless::ScriptedHook;

        let _g = SERIAL.lock();
        let s = active();
        let mut hook = ScriptedHook::new(vec![
            (Duration::ZERO, RawInput::Move { x: 500.0, y: 250.0 }),
            (Duration::from_millis(20), key('z', true)),
            (Duration::ZERO, RawInput::Key { key: Key::Named(NamedKey::Escape), pressed: true }),
        ]);
        s.attach(&mut hook).unwrap();
        let m = s.wait_finished(Duration::from_secs(2)).unwrap();
        hook.stop();
        assert_eq!(m.events.len(), 2);
        assert!(m.events[1].offset >= 0.015);
    }
}
