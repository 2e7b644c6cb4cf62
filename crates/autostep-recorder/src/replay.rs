//! Playback session: replays a recording with its original timing
//!
//! `Idle -> ArmCountdown -> Playing <-> Paused -> Finished`, plus `Cancelled`
//! from any started state.
//!
//! The timing loop runs on its own worker thread. Pause and cancel are flags
//! the worker checks at every event boundary and every poll tick, so the
//! control thread never blocks on playback.

use crate::events::{Action, RecordedEvent, RecordingMetadata};
use autostep_core::{Error, ErrorCode, InputInjector, Resolution, Result, ScreenMetrics};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Only one playback may run per process
static PLAYBACK_SLOT: AtomicBool = AtomicBool::new(false);

/// Player configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Lead-in before the first event fires
    pub countdown: Duration,
    /// Granularity of pause polling and cancellable waits
    pub poll_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What to play and how often
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Full passes over the log, at least 1
    pub repeat_count: u32,
    /// Seconds to idle between passes, not negative
    pub repeat_delay: f64,
    /// Playback speed (1.0 = real-time, 2.0 = 2x speed)
    pub speed: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            repeat_delay: 1.0,
            speed: 1.0,
        }
    }
}

impl PlaybackOptions {
    pub fn new(repeat_count: u32, repeat_delay: f64) -> Self {
        Self {
            repeat_count,
            repeat_delay,
            ..Default::default()
        }
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.repeat_count < 1 {
            return Err(Error::invalid_parameter("repeat count", "must be a positive integer"));
        }
        if !self.repeat_delay.is_finite() || self.repeat_delay < 0.0 {
            return Err(Error::invalid_parameter("repeat delay", "must be a non-negative number of seconds"));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::invalid_parameter("speed", "must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    ArmCountdown,
    Playing,
    Paused,
    Finished,
    Cancelled,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Finished | PlaybackState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub moves: usize,
    pub buttons: usize,
    pub keys: usize,
    /// Injections that failed and were skipped
    pub failures: usize,
    pub cycles_completed: u32,
}

/// Recorded and current screen sizes differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionMismatch {
    pub recorded: Resolution,
    pub current: Resolution,
}

impl From<ResolutionMismatch> for Error {
    fn from(m: ResolutionMismatch) -> Self {
        Error::resolution_mismatch(
            (m.recorded.width, m.recorded.height),
            (m.current.width, m.current.height),
        )
    }
}

/// Notifications for whoever drives the session
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    State(PlaybackState),
    CycleStarted { cycle: u32, total: u32 },
    WaitingBetweenCycles { seconds: f64 },
    InjectionFailed { cycle: u32, index: usize, error: Error },
    /// Sent exactly once when every cycle has played
    Finished(ReplayStats),
    /// Sent exactly once when the run was cancelled or declined
    Cancelled(ReplayStats),
}

/// Terminal state of a run and what it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOutcome {
    pub state: PlaybackState,
    pub stats: ReplayStats,
}

struct Shared {
    state: Mutex<PlaybackState>,
    cancel: AtomicBool,
    paused: AtomicBool,
    tx: Sender<PlaybackUpdate>,
}

impl Shared {
    fn set_state(&self, state: PlaybackState) {
        *self.state.lock() = state;
        let _ = self.tx.send(PlaybackUpdate::State(state));
    }

    /// Move to `to` only if currently `from`
    fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        let mut s = self.state.lock();
        if *s != from {
            return false;
        }
        *s = to;
        let _ = self.tx.send(PlaybackUpdate::State(to));
        true
    }
}

pub struct PlaybackSession {
    recording: Arc<RecordingMetadata>,
    options: PlaybackOptions,
    config: PlaybackConfig,
    screen: Arc<dyn ScreenMetrics>,
    shared: Arc<Shared>,
    rx: Receiver<PlaybackUpdate>,
    worker: Mutex<Option<thread::JoinHandle<PlaybackOutcome>>>,
}

impl PlaybackSession {
    /// Rejects bad options before anything happens
    pub fn new(
        recording: RecordingMetadata,
        options: PlaybackOptions,
        screen: Arc<dyn ScreenMetrics>,
    ) -> Result<Self> {
        Self::with_config(recording, options, screen, PlaybackConfig::default())
    }

    pub fn with_config(
        recording: RecordingMetadata,
        options: PlaybackOptions,
        screen: Arc<dyn ScreenMetrics>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        options.validate()?;
        if config.poll_interval.is_zero() {
            return Err(Error::invalid_parameter("poll interval", "must be greater than zero"));
        }
        let (tx, rx) = unbounded();
        Ok(Self {
            recording: Arc::new(recording),
            options,
            config,
            screen,
            shared: Arc::new(Shared {
                state: Mutex::new(PlaybackState::Idle),
                cancel: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                tx,
            }),
            rx,
            worker: Mutex::new(None),
        })
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.state.lock()
    }

    pub fn options(&self) -> PlaybackOptions {
        self.options
    }

    pub fn recording(&self) -> &RecordingMetadata {
        &self.recording
    }

    pub fn updates(&self) -> Receiver<PlaybackUpdate> {
        self.rx.clone()
    }

    /// `Some` when the recording was captured on a different screen size
    pub fn resolution_mismatch(&self) -> Result<Option<ResolutionMismatch>> {
        let current = self.screen.resolution()?;
        let recorded = self.recording.resolution();
        Ok((current != recorded).then_some(ResolutionMismatch { recorded, current }))
    }

    /// Idle -> ArmCountdown, then hand the run to a worker thread.
    ///
    /// On a resolution mismatch `confirm` decides whether to go on; declining
    /// ends the session in `Cancelled`.
    pub fn start<I, F>(&self, injector: I, confirm: F) -> Result<()>
    where
        I: InputInjector + 'static,
        F: FnOnce(&ResolutionMismatch) -> bool,
    {
        let state = self.state();
        if state != PlaybackState::Idle {
            return Err(Error::invalid_state("start playback", state));
        }
        if PLAYBACK_SLOT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::concurrent_session("playback"));
        }
        let slot = SlotGuard;

        if let Some(mismatch) = self.resolution_mismatch()? {
            tracing::warn!(
                recorded = %mismatch.recorded,
                current = %mismatch.current,
                "resolution mismatch"
            );
            if !confirm(&mismatch) {
                tracing::info!("playback declined after resolution mismatch");
                self.shared.set_state(PlaybackState::Cancelled);
                let _ = self
                    .shared
                    .tx
                    .send(PlaybackUpdate::Cancelled(ReplayStats::default()));
                return Err(mismatch.into());
            }
        }

        self.shared.set_state(PlaybackState::ArmCountdown);
        let worker = Worker {
            recording: self.recording.clone(),
            options: self.options,
            config: self.config.clone(),
            screen: self.screen.clone(),
            shared: self.shared.clone(),
            injector,
            stats: ReplayStats::default(),
            _slot: slot,
        };
        tracing::info!(
            events = self.recording.events.len(),
            repeat = self.options.repeat_count,
            delay = self.options.repeat_delay,
            "playback armed"
        );
        *self.worker.lock() = Some(thread::spawn(move || worker.run()));
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let mut s = self.shared.state.lock();
        if *s != PlaybackState::Playing {
            return Err(Error::invalid_state("pause playback", *s));
        }
        self.shared.paused.store(true, Ordering::SeqCst);
        *s = PlaybackState::Paused;
        let _ = self.shared.tx.send(PlaybackUpdate::State(*s));
        tracing::info!("playback paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        let mut s = self.shared.state.lock();
        if *s != PlaybackState::Paused {
            return Err(Error::invalid_state("resume playback", *s));
        }
        self.shared.paused.store(false, Ordering::SeqCst);
        *s = PlaybackState::Playing;
        let _ = self.shared.tx.send(PlaybackUpdate::State(*s));
        tracing::info!("playback resumed");
        Ok(())
    }

    pub fn toggle_pause(&self) -> Result<PlaybackState> {
        match self.state() {
            PlaybackState::Paused => self.resume()?,
            _ => self.pause()?,
        }
        Ok(self.state())
    }

    /// Abort the current and all remaining cycles. Injected state is left as is.
    pub fn cancel(&self) -> Result<()> {
        let mut s = self.shared.state.lock();
        if *s == PlaybackState::Idle || s.is_terminal() {
            return Err(Error::invalid_state("cancel playback", *s));
        }
        self.shared.cancel.store(true, Ordering::SeqCst);
        *s = PlaybackState::Cancelled;
        let _ = self.shared.tx.send(PlaybackUpdate::State(*s));
        tracing::info!("playback cancelled");
        Ok(())
    }

    /// Block until the run ends
    pub fn wait(&self) -> Result<PlaybackOutcome> {
        let handle = self.worker.lock().take();
        match handle {
            Some(h) => h
                .join()
                .map_err(|_| Error::new(ErrorCode::Unknown, "playback worker panicked")),
            None => {
                let state = self.state();
                if state.is_terminal() {
                    Ok(PlaybackOutcome { state, stats: ReplayStats::default() })
                } else {
                    Err(Error::invalid_state("wait for playback", state))
                }
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }
}

/// Releases the playback slot when the run is over
struct SlotGuard;

impl Drop for SlotGuard {
    fn drop(&mut self) {
        PLAYBACK_SLOT.store(false, Ordering::SeqCst);
    }
}

struct Worker<I> {
    recording: Arc<RecordingMetadata>,
    options: PlaybackOptions,
    config: PlaybackConfig,
    screen: Arc<dyn ScreenMetrics>,
    shared: Arc<Shared>,
    injector: I,
    stats: ReplayStats,
    _slot: SlotGuard,
}

impl<I: InputInjector> Worker<I> {
    fn run(mut self) -> PlaybackOutcome {
        if !self.wait(self.config.countdown)
            || !self
                .shared
                .transition(PlaybackState::ArmCountdown, PlaybackState::Playing)
        {
            return self.cancelled();
        }

        let recording = self.recording.clone();
        let total = self.options.repeat_count;
        for cycle in 0..total {
            if self.is_cancelled() {
                return self.cancelled();
            }
            tracing::info!(cycle = cycle + 1, total, "playing cycle");
            let _ = self.shared.tx.send(PlaybackUpdate::CycleStarted { cycle: cycle + 1, total });

            let mut last_offset = 0.0;
            for (index, event) in recording.events.iter().enumerate() {
                let delta = (event.offset - last_offset).max(0.0) / self.options.speed;
                if !self.wait(seconds(delta)) || !self.hold_while_paused() {
                    return self.cancelled();
                }
                self.fire(cycle + 1, index, event);
                last_offset = event.offset;
            }
            self.stats.cycles_completed += 1;

            if cycle + 1 < total {
                let _ = self.shared.tx.send(PlaybackUpdate::WaitingBetweenCycles {
                    seconds: self.options.repeat_delay,
                });
                if !self.wait(seconds(self.options.repeat_delay)) {
                    return self.cancelled();
                }
            }
        }

        let mut s = self.shared.state.lock();
        if self.is_cancelled() || s.is_terminal() {
            drop(s);
            return self.cancelled();
        }
        *s = PlaybackState::Finished;
        let _ = self.shared.tx.send(PlaybackUpdate::State(PlaybackState::Finished));
        let _ = self.shared.tx.send(PlaybackUpdate::Finished(self.stats));
        drop(s);
        tracing::info!(
            cycles = self.stats.cycles_completed,
            failures = self.stats.failures,
            "playback finished"
        );
        PlaybackOutcome { state: PlaybackState::Finished, stats: self.stats }
    }

    /// Execute one event. Failures are counted and skipped.
    fn fire(&mut self, cycle: u32, index: usize, event: &RecordedEvent) {
        if let Err(error) = self.apply(&event.action) {
            self.stats.failures += 1;
            tracing::warn!(cycle, index, %error, "injection failed, skipping event");
            let _ = self
                .shared
                .tx
                .send(PlaybackUpdate::InjectionFailed { cycle, index, error });
        }
    }

    fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::MouseMove { nx, ny } => {
                self.move_pointer(*nx, *ny)?;
                self.stats.moves += 1;
            }
            Action::MouseButton { nx, ny, button, pressed } => {
                self.move_pointer(*nx, *ny)?;
                self.injector.button(*button, *pressed)?;
                self.stats.buttons += 1;
            }
            Action::KeyDown { key } => {
                self.injector.key(key, true)?;
                self.stats.keys += 1;
            }
            Action::KeyUp { key } => {
                self.injector.key(key, false)?;
                self.stats.keys += 1;
            }
        }
        Ok(())
    }

    /// Positions scale against the screen as it is right now
    fn move_pointer(&mut self, nx: f64, ny: f64) -> Result<()> {
        let current = self.screen.resolution()?;
        let (x, y) = current.denormalize(nx, ny);
        tracing::debug!(x, y, "move pointer");
        self.injector.move_to(x, y)
    }

    /// Sleep for `duration` of unpaused time. `false` once cancelled.
    fn wait(&self, duration: Duration) -> bool {
        let poll = self.config.poll_interval;
        let mut remaining = duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            if self.shared.paused.load(Ordering::SeqCst) {
                thread::sleep(poll);
                continue;
            }
            if remaining.is_zero() {
                return true;
            }
            let started = Instant::now();
            thread::sleep(remaining.min(poll));
            remaining = remaining.saturating_sub(started.elapsed());
        }
    }

    fn hold_while_paused(&self) -> bool {
        self.wait(Duration::ZERO)
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }

    fn cancelled(&self) -> PlaybackOutcome {
        {
            let mut s = self.shared.state.lock();
            if *s != PlaybackState::Cancelled {
                *s = PlaybackState::Cancelled;
                let _ = self.shared.tx.send(PlaybackUpdate::State(PlaybackState::Cancelled));
            }
        }
        let _ = self.shared.tx.send(PlaybackUpdate::Cancelled(self.stats));
        tracing::info!(cycles = self.stats.cycles_completed, "playback stopped early");
        PlaybackOutcome { state: PlaybackState::Cancelled, stats: self.stats }
    }
}

fn seconds(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)
}
