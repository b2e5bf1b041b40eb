//! Symbolic game inputs and their resolution to physical keys.
//!
//! Scripts talk about *what* to do (`GameInput::Skill`); the bindings decide
//! *which* key or mouse button does it. This is the only place key mappings
//! are resolved.

use std::collections::HashMap;
use std::fmt;

use actscript_core::config::KeyConfig;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A symbolic input understood by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameInput {
    Forward,
    Left,
    Back,
    Right,
    Skill,
    Burst,
    Attack,
    Sprint,
    Jump,
    Interact,
    AltInteract,
    /// Party member slot, 1 through 4.
    Member(u8),
}

impl fmt::Display for GameInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameInput::Forward => write!(f, "forward"),
            GameInput::Left => write!(f, "left"),
            GameInput::Back => write!(f, "back"),
            GameInput::Right => write!(f, "right"),
            GameInput::Skill => write!(f, "skill"),
            GameInput::Burst => write!(f, "burst"),
            GameInput::Attack => write!(f, "attack"),
            GameInput::Sprint => write!(f, "sprint"),
            GameInput::Jump => write!(f, "jump"),
            GameInput::Interact => write!(f, "interact"),
            GameInput::AltInteract => write!(f, "alt_interact"),
            GameInput::Member(n) => write!(f, "member_{}", n),
        }
    }
}

/// A physical key or mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Windows virtual-key code.
    Key(u16),
    MouseLeft,
    MouseRight,
    MouseMiddle,
}

impl KeyCode {
    /// Parse a key name such as `w`, `space`, `shift`, `f5` or `mouse_left`.
    pub fn from_name(name: &str) -> Result<Self, InputError> {
        let lower = name.trim().to_ascii_lowercase();
        let code = match lower.as_str() {
            "mouse_left" | "lmb" => return Ok(KeyCode::MouseLeft),
            "mouse_right" | "rmb" => return Ok(KeyCode::MouseRight),
            "mouse_middle" | "mmb" => return Ok(KeyCode::MouseMiddle),
            "space" => 0x20,
            "shift" | "lshift" => 0xA0,
            "rshift" => 0xA1,
            "ctrl" | "lctrl" => 0xA2,
            "rctrl" => 0xA3,
            "alt" | "lalt" => 0xA4,
            "ralt" => 0xA5,
            "tab" => 0x09,
            "enter" | "return" => 0x0D,
            "esc" | "escape" => 0x1B,
            "backspace" => 0x08,
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    // Letters and digits share their ASCII uppercase codes.
                    (Some(c), None) if c.is_ascii_alphanumeric() => {
                        c.to_ascii_uppercase() as u16
                    }
                    (Some('f'), Some(_)) => match lower[1..].parse::<u16>() {
                        Ok(n) if (1..=12).contains(&n) => 0x70 + n - 1,
                        _ => return Err(InputError::UnknownKey(name.to_string())),
                    },
                    _ => return Err(InputError::UnknownKey(name.to_string())),
                }
            }
        };
        Ok(KeyCode::Key(code))
    }
}

/// Resolved bindings from every `GameInput` to a `KeyCode`.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<GameInput, KeyCode>,
}

impl KeyBindings {
    /// Resolve every configured key name, failing on the first unknown one.
    pub fn from_config(config: &KeyConfig) -> Result<Self, InputError> {
        let entries = [
            (GameInput::Forward, &config.forward),
            (GameInput::Left, &config.left),
            (GameInput::Back, &config.back),
            (GameInput::Right, &config.right),
            (GameInput::Skill, &config.skill),
            (GameInput::Burst, &config.burst),
            (GameInput::Attack, &config.attack),
            (GameInput::Sprint, &config.sprint),
            (GameInput::Jump, &config.jump),
            (GameInput::Interact, &config.interact),
            (GameInput::AltInteract, &config.alt_interact),
            (GameInput::Member(1), &config.member_1),
            (GameInput::Member(2), &config.member_2),
            (GameInput::Member(3), &config.member_3),
            (GameInput::Member(4), &config.member_4),
        ];

        let mut map = HashMap::with_capacity(entries.len());
        for (input, name) in entries {
            map.insert(input, KeyCode::from_name(name)?);
        }
        Ok(Self { map })
    }

    /// Look up the physical key for an input.
    pub fn resolve(&self, input: GameInput) -> Result<KeyCode, InputError> {
        self.map
            .get(&input)
            .copied()
            .ok_or_else(|| InputError::UnknownKey(input.to_string()))
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        // The default KeyConfig only uses names that from_name accepts.
        Self::from_config(&KeyConfig::default()).unwrap_or_else(|_| Self {
            map: HashMap::new(),
        })
    }
}
