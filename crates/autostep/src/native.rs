//! Real backend on top of rdev: global hook, injector and display size
//!
//! rdev's listener cannot be unblocked once started, so stopping the hook
//! only mutes it. The listener thread ends with the process.

use autostep_core::{
    Button, Error, InputHook, InputInjector, InputSink, Key, NamedKey, RawInput, Resolution,
    Result, ScreenMetrics,
};
use rdev::EventType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

pub struct Screen;

impl ScreenMetrics for Screen {
    fn resolution(&self) -> Result<Resolution> {
        let (w, h) = rdev::display_size()
            .map_err(|e| Error::unsupported(format!("cannot query display size: {:?}", e)))?;
        Ok(Resolution::new(
            u32::try_from(w).unwrap_or(u32::MAX),
            u32::try_from(h).unwrap_or(u32::MAX),
        ))
    }
}

pub struct Injector;

impl InputInjector for Injector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        send(&EventType::MouseMove { x: x as f64, y: y as f64 }, "move pointer")
    }

    fn button(&mut self, button: Button, pressed: bool) -> Result<()> {
        let b = to_rdev_button(button);
        let event = if pressed { EventType::ButtonPress(b) } else { EventType::ButtonRelease(b) };
        send(&event, "mouse button")
    }

    fn key(&mut self, key: &Key, pressed: bool) -> Result<()> {
        let k = to_rdev_key(key)
            .ok_or_else(|| Error::injection_failed("key", format!("no key code for '{}'", key)))?;
        let event = if pressed { EventType::KeyPress(k) } else { EventType::KeyRelease(k) };
        send(&event, "key")
    }
}

fn send(event: &EventType, action: &str) -> Result<()> {
    rdev::simulate(event).map_err(|e| Error::injection_failed(action, format!("{:?}", e)))
}

#[derive(Default)]
pub struct Hook {
    running: Arc<AtomicBool>,
    started: bool,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputHook for Hook {
    fn start(&mut self, sink: InputSink) -> Result<()> {
        if self.started {
            return Err(Error::invalid_state("start hook", "running"));
        }
        self.started = true;
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        thread::Builder::new()
            .name("autostep-hook".into())
            .spawn(move || {
                let mut last = (0.0, 0.0);
                let result = rdev::listen(move |event: rdev::Event| {
                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(input) = translate(&event, &mut last) {
                        sink(input);
                    }
                });
                if let Err(e) = result {
                    tracing::error!(error = ?e, "input hook failed");
                }
            })?;
        tracing::debug!("input hook started");
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Button events carry no position in rdev; use the last move
fn translate(event: &rdev::Event, last: &mut (f64, f64)) -> Option<RawInput> {
    match event.event_type {
        EventType::MouseMove { x, y } => {
            *last = (x, y);
            Some(RawInput::Move { x, y })
        }
        EventType::ButtonPress(b) => Some(RawInput::Button {
            x: last.0,
            y: last.1,
            button: from_rdev_button(b)?,
            pressed: true,
        }),
        EventType::ButtonRelease(b) => Some(RawInput::Button {
            x: last.0,
            y: last.1,
            button: from_rdev_button(b)?,
            pressed: false,
        }),
        EventType::KeyPress(k) => Some(RawInput::Key {
            key: from_rdev_key(k, event.name.as_deref()),
            pressed: true,
        }),
        EventType::KeyRelease(k) => Some(RawInput::Key {
            key: from_rdev_key(k, event.name.as_deref()),
            pressed: false,
        }),
        EventType::Wheel { .. } => None,
    }
}

fn from_rdev_button(b: rdev::Button) -> Option<Button> {
    match b {
        rdev::Button::Left => Some(Button::Left),
        rdev::Button::Right => Some(Button::Right),
        rdev::Button::Middle => Some(Button::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

fn to_rdev_button(b: Button) -> rdev::Button {
    match b {
        Button::Left => rdev::Button::Left,
        Button::Right => rdev::Button::Right,
        Button::Middle => rdev::Button::Middle,
    }
}

// Generic modifiers come first so the hook reports `shift` rather than `shift_l`
const NAMED: &[(NamedKey, rdev::Key)] = &[
    (NamedKey::Enter, rdev::Key::Return),
    (NamedKey::Escape, rdev::Key::Escape),
    (NamedKey::Tab, rdev::Key::Tab),
    (NamedKey::Space, rdev::Key::Space),
    (NamedKey::Backspace, rdev::Key::Backspace),
    (NamedKey::Delete, rdev::Key::Delete),
    (NamedKey::Insert, rdev::Key::Insert),
    (NamedKey::Home, rdev::Key::Home),
    (NamedKey::End, rdev::Key::End),
    (NamedKey::PageUp, rdev::Key::PageUp),
    (NamedKey::PageDown, rdev::Key::PageDown),
    (NamedKey::Up, rdev::Key::UpArrow),
    (NamedKey::Down, rdev::Key::DownArrow),
    (NamedKey::Left, rdev::Key::LeftArrow),
    (NamedKey::Right, rdev::Key::RightArrow),
    (NamedKey::Shift, rdev::Key::ShiftLeft),
    (NamedKey::ShiftLeft, rdev::Key::ShiftLeft),
    (NamedKey::ShiftRight, rdev::Key::ShiftRight),
    (NamedKey::Ctrl, rdev::Key::ControlLeft),
    (NamedKey::CtrlLeft, rdev::Key::ControlLeft),
    (NamedKey::CtrlRight, rdev::Key::ControlRight),
    (NamedKey::Alt, rdev::Key::Alt),
    (NamedKey::AltLeft, rdev::Key::Alt),
    (NamedKey::AltRight, rdev::Key::AltGr),
    (NamedKey::AltGr, rdev::Key::AltGr),
    (NamedKey::Cmd, rdev::Key::MetaLeft),
    (NamedKey::CmdLeft, rdev::Key::MetaLeft),
    (NamedKey::CmdRight, rdev::Key::MetaRight),
    (NamedKey::CapsLock, rdev::Key::CapsLock),
    (NamedKey::NumLock, rdev::Key::NumLock),
    (NamedKey::ScrollLock, rdev::Key::ScrollLock),
    (NamedKey::PrintScreen, rdev::Key::PrintScreen),
    (NamedKey::Pause, rdev::Key::Pause),
    (NamedKey::F(1), rdev::Key::F1),
    (NamedKey::F(2), rdev::Key::F2),
    (NamedKey::F(3), rdev::Key::F3),
    (NamedKey::F(4), rdev::Key::F4),
    (NamedKey::F(5), rdev::Key::F5),
    (NamedKey::F(6), rdev::Key::F6),
    (NamedKey::F(7), rdev::Key::F7),
    (NamedKey::F(8), rdev::Key::F8),
    (NamedKey::F(9), rdev::Key::F9),
    (NamedKey::F(10), rdev::Key::F10),
    (NamedKey::F(11), rdev::Key::F11),
    (NamedKey::F(12), rdev::Key::F12),
];

// US layout. Unshifted characters first so the hook reports the base key.
const CHARS: &[(char, rdev::Key)] = &[
    ('a', rdev::Key::KeyA),
    ('b', rdev::Key::KeyB),
    ('c', rdev::Key::KeyC),
    ('d', rdev::Key::KeyD),
    ('e', rdev::Key::KeyE),
    ('f', rdev::Key::KeyF),
    ('g', rdev::Key::KeyG),
    ('h', rdev::Key::KeyH),
    ('i', rdev::Key::KeyI),
    ('j', rdev::Key::KeyJ),
    ('k', rdev::Key::KeyK),
    ('l', rdev::Key::KeyL),
    ('m', rdev::Key::KeyM),
    ('n', rdev::Key::KeyN),
    ('o', rdev::Key::KeyO),
    ('p', rdev::Key::KeyP),
    ('q', rdev::Key::KeyQ),
    ('r', rdev::Key::KeyR),
    ('s', rdev::Key::KeyS),
    ('t', rdev::Key::KeyT),
    ('u', rdev::Key::KeyU),
    ('v', rdev::Key::KeyV),
    ('w', rdev::Key::KeyW),
    ('x', rdev::Key::KeyX),
    ('y', rdev::Key::KeyY),
    ('z', rdev::Key::KeyZ),
    ('0', rdev::Key::Num0),
    ('1', rdev::Key::Num1),
    ('2', rdev::Key::Num2),
    ('3', rdev::Key::Num3),
    ('4', rdev::Key::Num4),
    ('5', rdev::Key::Num5),
    ('6', rdev::Key::Num6),
    ('7', rdev::Key::Num7),
    ('8', rdev::Key::Num8),
    ('9', rdev::Key::Num9),
    ('`', rdev::Key::BackQuote),
    ('-', rdev::Key::Minus),
    ('=', rdev::Key::Equal),
    ('[', rdev::Key::LeftBracket),
    (']', rdev::Key::RightBracket),
    ('\\', rdev::Key::BackSlash),
    (';', rdev::Key::SemiColon),
    ('\'', rdev::Key::Quote),
    (',', rdev::Key::Comma),
    ('.', rdev::Key::Dot),
    ('/', rdev::Key::Slash),
    (' ', rdev::Key::Space),
    ('~', rdev::Key::BackQuote),
    ('!', rdev::Key::Num1),
    ('@', rdev::Key::Num2),
    ('#', rdev::Key::Num3),
    ('$', rdev::Key::Num4),
    ('%', rdev::Key::Num5),
    ('^', rdev::Key::Num6),
    ('&', rdev::Key::Num7),
    ('*', rdev::Key::Num8),
    ('(', rdev::Key::Num9),
    (')', rdev::Key::Num0),
    ('_', rdev::Key::Minus),
    ('+', rdev::Key::Equal),
    ('{', rdev::Key::LeftBracket),
    ('}', rdev::Key::RightBracket),
    ('|', rdev::Key::BackSlash),
    (':', rdev::Key::SemiColon),
    ('"', rdev::Key::Quote),
    ('<', rdev::Key::Comma),
    ('>', rdev::Key::Dot),
    ('?', rdev::Key::Slash),
];

fn from_rdev_key(k: rdev::Key, name: Option<&str>) -> Key {
    if let Some((named, _)) = NAMED.iter().find(|(_, r)| *r == k) {
        return Key::Named(*named);
    }
    if let Some((c, _)) = CHARS.iter().find(|(_, r)| *r == k) {
        return Key::Char(*c);
    }
    let mut chars = name.unwrap_or_default().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Key::Char(c),
        _ => match k {
            rdev::Key::Unknown(code) => Key::Other(format!("<{}>", code)),
            other => Key::Other(format!("{:?}", other)),
        },
    }
}

fn to_rdev_key(key: &Key) -> Option<rdev::Key> {
    match key {
        Key::Named(named) => NAMED.iter().find(|(n, _)| n == named).map(|(_, r)| *r),
        Key::Char(c) => {
            let lower = c.to_ascii_lowercase();
            CHARS.iter().find(|(ch, _)| *ch == lower).map(|(_, r)| *r)
        }
        Key::Other(raw) => raw
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .and_then(|s| s.parse().ok())
            .map(rdev::Key::Unknown),
    }
}
