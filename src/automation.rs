use enigo::{Direction, Enigo, Keyboard, Settings};
use tracing::debug;

use crate::action::Key;
use crate::error::{MacroError, Result};

/// OS input injection, the one place macros touch the desktop.
pub trait InputInjector {
    /// Press every key of the combination in order, then release in reverse.
    fn key_combo(&mut self, keys: &[Key]) -> Result<()>;

    fn type_text(&mut self, text: &str) -> Result<()>;
}

/// Injects through enigo. The OS connection is opened on first use, so a
/// session that never leaves test mode never opens one.
#[derive(Default)]
pub struct EnigoInjector {
    enigo: Option<Enigo>,
}

impl EnigoInjector {
    pub fn new() -> EnigoInjector {
        EnigoInjector::default()
    }

    fn connection(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            debug!("Opening input injection connection");
            self.enigo = Some(Enigo::new(&Settings::default())?);
        }

        self.enigo
            .as_mut()
            .ok_or_else(|| MacroError::Injection("input connection unavailable".to_string()))
    }
}

fn to_enigo(key: Key) -> enigo::Key {
    use enigo::Key as E;

    match key {
        Key::Control => E::Control,
        Key::Alt => E::Alt,
        Key::Shift => E::Shift,
        Key::Meta => E::Meta,
        Key::Return => E::Return,
        Key::Escape => E::Escape,
        Key::Tab => E::Tab,
        Key::Space => E::Space,
        Key::Backspace => E::Backspace,
        Key::Delete => E::Delete,
        Key::Home => E::Home,
        Key::End => E::End,
        Key::PageUp => E::PageUp,
        Key::PageDown => E::PageDown,
        Key::Up => E::UpArrow,
        Key::Down => E::DownArrow,
        Key::Left => E::LeftArrow,
        Key::Right => E::RightArrow,
        Key::CapsLock => E::CapsLock,
        Key::F(n) => function_key(n),
        Key::Char(ch) => E::Unicode(ch),
    }
}

fn function_key(n: u8) -> enigo::Key {
    use enigo::Key as E;

    match n {
        1 => E::F1,
        2 => E::F2,
        3 => E::F3,
        4 => E::F4,
        5 => E::F5,
        6 => E::F6,
        7 => E::F7,
        8 => E::F8,
        9 => E::F9,
        10 => E::F10,
        11 => E::F11,
        12 => E::F12,
        13 => E::F13,
        14 => E::F14,
        15 => E::F15,
        16 => E::F16,
        17 => E::F17,
        18 => E::F18,
        19 => E::F19,
        _ => E::F20,
    }
}

impl InputInjector for EnigoInjector {
    fn key_combo(&mut self, keys: &[Key]) -> Result<()> {
        let enigo = self.connection()?;

        let mut pressed = Vec::with_capacity(keys.len());
        let mut outcome = Ok(());

        for key in keys.iter().copied().map(to_enigo) {
            if let Err(err) = enigo.key(key, Direction::Press) {
                outcome = Err(err.into());
                break;
            }
            pressed.push(key);
        }

        // Release whatever went down, even after a failed press
        for key in pressed.into_iter().rev() {
            let released = enigo.key(key, Direction::Release);
            if outcome.is_ok() {
                outcome = released.map_err(Into::into);
            }
        }

        outcome
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.connection()?.text(text)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Clone, Debug, PartialEq)]
pub enum Injected {
    Combo(Vec<Key>),
    Text(String),
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingInjector {
    pub calls: Vec<Injected>,
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl RecordingInjector {
    fn record(&mut self, call: Injected) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(MacroError::Injection(reason.clone()));
        }
        self.calls.push(call);
        Ok(())
    }
}

#[cfg(test)]
impl InputInjector for RecordingInjector {
    fn key_combo(&mut self, keys: &[Key]) -> Result<()> {
        self.record(Injected::Combo(keys.to_vec()))
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.record(Injected::Text(text.to_string()))
    }
}
