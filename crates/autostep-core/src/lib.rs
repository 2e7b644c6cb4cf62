//! autostep-core - shared building blocks for desktop step recording
//!
//! - **input**: mouse buttons, symbolic keys and raw hook events
//! - **normalize**: resolution-independent pointer coordinates
//! - **platform**: seams to the OS hook, injector and screen query
//! - **error**: structured errors with stable codes

pub mod error;
pub mod input;
pub mod normalize;
pub mod platform;

pub use error::{Error, ErrorCode, Result};
pub use input::{Button, Key, NamedKey, RawInput};
pub use normalize::{denormalize, normalize, Resolution};
pub use platform::{InputHook, InputInjector, InputSink, ScreenMetrics};

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::input::{Button, Key, NamedKey, RawInput};
    pub use crate::normalize::{denormalize, normalize, Resolution};
    pub use crate::platform::headless::{FixedScreen, LogInjector};
    pub use crate::platform::{InputHook, InputInjector, InputSink, ScreenMetrics};
}
