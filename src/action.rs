use std::fmt;

use serde::{Deserialize, Serialize};

use crate::automation::InputInjector;
use crate::error::{MacroError, Result};
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "Send Keys")]
    SendKeys,
    #[serde(rename = "Write Text")]
    WriteText,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::SendKeys, ActionKind::WriteText];

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::SendKeys => "Send Keys",
            ActionKind::WriteText => "Write Text",
        }
    }

    // Table text for a configured action, e.g. "Send Keys: ctrl+c"
    pub fn display(&self, payload: &str) -> String {
        match self {
            ActionKind::SendKeys => format!("{}: {}", self.label(), payload),
            ActionKind::WriteText => format!("{}: {}", self.label(), util::preview(payload)),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ActionConfig {
    pub fn for_kind(kind: ActionKind, payload: &str) -> ActionConfig {
        match kind {
            ActionKind::SendKeys => ActionConfig {
                keys: Some(payload.to_string()),
                text: None,
            },
            ActionKind::WriteText => ActionConfig {
                keys: None,
                text: Some(payload.to_string()),
            },
        }
    }

    pub fn payload(&self, kind: ActionKind) -> &str {
        let value = match kind {
            ActionKind::SendKeys => &self.keys,
            ActionKind::WriteText => &self.text,
        };
        value.as_deref().unwrap_or("")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Control,
    Alt,
    Shift,
    Meta,
    Return,
    Escape,
    Tab,
    Space,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    F(u8),
    Char(char),
}

impl Key {
    pub fn parse(token: &str) -> Result<Key> {
        let token = token.trim();
        let name = token.to_lowercase();

        let key = match name.as_str() {
            "ctrl" | "control" => Key::Control,
            "alt" | "option" => Key::Alt,
            "shift" => Key::Shift,
            "win" | "super" | "meta" | "cmd" | "command" => Key::Meta,
            "enter" | "return" => Key::Return,
            "esc" | "escape" => Key::Escape,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" | "pgup" => Key::PageUp,
            "pagedown" | "pgdn" => Key::PageDown,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "capslock" => Key::CapsLock,
            _ => {
                // Single characters keep their case so "A" types a capital
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Key::Char(ch),
                    _ => function_key(&name)
                        .ok_or_else(|| MacroError::UnknownKey(token.to_string()))?,
                }
            }
        };

        Ok(key)
    }
}

fn function_key(name: &str) -> Option<Key> {
    let number: u8 = name.strip_prefix('f')?.parse().ok()?;
    (1..=20).contains(&number).then_some(Key::F(number))
}

/// Parse "ctrl+c, ctrl+v" into ordered combinations. Empty entries are skipped;
/// one bad token rejects the whole list.
pub fn parse_combos(keys: &str) -> Result<Vec<Vec<Key>>> {
    keys.split(',')
        .map(str::trim)
        .filter(|combo| !combo.is_empty())
        .map(|combo| combo.split('+').map(Key::parse).collect::<Result<Vec<Key>>>())
        .collect()
}

pub fn execute(
    kind: ActionKind,
    config: &ActionConfig,
    injector: &mut dyn InputInjector,
) -> Result<()> {
    match kind {
        ActionKind::SendKeys => {
            let combos = parse_combos(config.payload(kind))?;
            for combo in combos {
                injector.key_combo(&combo)?;
            }
        }
        ActionKind::WriteText => {
            let text = config.payload(kind);
            if !text.is_empty() {
                injector.type_text(text)?;
            }
        }
    }

    Ok(())
}
