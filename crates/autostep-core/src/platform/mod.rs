//! Platform seams
//!
//! The OS hook, the OS injector and the screen query are collaborators the
//! engine talks to through these traits. A headless implementation lives in
//! [`headless`]; real backends live with the binaries that need them.

pub mod headless;

use crate::input::{Button, Key, RawInput};
use crate::normalize::Resolution;
use crate::Result;
use std::sync::Arc;

/// Current screen size on demand
pub trait ScreenMetrics: Send + Sync {
    fn resolution(&self) -> Result<Resolution>;
}

/// Synthetic input injection. Every call is best-effort: callers log and
/// skip failures instead of aborting.
pub trait InputInjector: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn button(&mut self, button: Button, pressed: bool) -> Result<()>;
    fn key(&mut self, key: &Key, pressed: bool) -> Result<()>;
}

/// Callback the hook invokes from its own threads for every raw event
pub type InputSink = Arc<dyn Fn(RawInput) + Send + Sync>;

/// Global mouse/keyboard hook, started and stopped once per session
pub trait InputHook: Send {
    fn start(&mut self, sink: InputSink) -> Result<()>;
    fn stop(&mut self);
}

impl<T: ScreenMetrics + ?Sized> ScreenMetrics for Arc<T> {
    fn resolution(&self) -> Result<Resolution> {
        (**self).resolution()
    }
}

impl<T: InputInjector + ?Sized> InputInjector for Box<T> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }

    fn button(&mut self, button: Button, pressed: bool) -> Result<()> {
        (**self).button(button, pressed)
    }

    fn key(&mut self, key: &Key, pressed: bool) -> Result<()> {
        (**self).key(key, pressed)
    }
}
