//! Headless backend: a fixed screen and an injector that only logs
//!
//! Used for dry runs and wherever no real display is available.

use crate::input::{Button, Key, RawInput};
use crate::normalize::Resolution;
use crate::platform::{InputHook, InputInjector, InputSink, ScreenMetrics};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Screen that always reports the same size
#[derive(Debug, Clone, Copy)]
pub struct FixedScreen(pub Resolution);

impl FixedScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self(Resolution::new(width, height))
    }
}

impl ScreenMetrics for FixedScreen {
    fn resolution(&self) -> Result<Resolution> {
        if !self.0.is_valid() {
            return Err(Error::invalid_parameter("screen size", "width and height must be positive"));
        }
        Ok(self.0)
    }
}

/// Injector that traces each action instead of performing it
#[derive(Debug, Default)]
pub struct LogInjector {
    actions: Arc<AtomicUsize>,
}

impl LogInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of actions performed so far
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.actions.clone()
    }

    fn bump(&self) {
        self.actions.fetch_add(1, Ordering::Relaxed);
    }
}

impl InputInjector for LogInjector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.bump();
        tracing::info!(target: "autostep::dry_run", x, y, "move pointer");
        Ok(())
    }

    fn button(&mut self, button: Button, pressed: bool) -> Result<()> {
        self.bump();
        tracing::info!(target: "autostep::dry_run", %button, pressed, "mouse button");
        Ok(())
    }

    fn key(&mut self, key: &Key, pressed: bool) -> Result<()> {
        self.bump();
        tracing::info!(target: "autostep::dry_run", %key, pressed, "key");
        Ok(())
    }
}

/// Hook that plays back a fixed script of raw inputs from its own thread
pub struct ScriptedHook {
    script: Vec<(Duration, RawInput)>,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScriptedHook {
    /// Each entry waits its delay, then delivers its input
    pub fn new(script: Vec<(Duration, RawInput)>) -> Self {
        Self {
            script,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Block until the whole script has been delivered
    pub fn join(&mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl InputHook for ScriptedHook {
    fn start(&mut self, sink: InputSink) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::invalid_state("start hook", "running"));
        }
        let script = std::mem::take(&mut self.script);
        let stop = self.stop.clone();
        self.thread = Some(thread::spawn(move || {
            for (delay, input) in script {
                thread::sleep(delay);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                sink(input);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fixed_screen_rejects_zero_size() {
        assert!(FixedScreen::new(0, 10).resolution().is_err());
        assert_eq!(
            FixedScreen::new(800, 600).resolution().unwrap(),
            Resolution::new(800, 600)
        );
    }

    #[test]
    fn log_injector_counts_actions() {
        let mut inj = LogInjector::new();
        let counter = inj.counter();
        inj.move_to(1, 2).unwrap();
        inj.button(Button::Left, true).unwrap();
        inj.key(&Key::Char('a'), false).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn scripted_hook_delivers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let mut hook = ScriptedHook::new(vec![
            (Duration::ZERO, RawInput::Move { x: 1.0, y: 1.0 }),
            (Duration::from_millis(5), RawInput::Key { key: Key::Char('q'), pressed: true }),
        ]);
        hook.start(Arc::new(move |i| sink_seen.lock().unwrap().push(i))).unwrap();
        hook.join();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], RawInput::Move { x: 1.0, y: 1.0 });
    }
}
