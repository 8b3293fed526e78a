use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Mouse button, serialized the way `Input.dispatchMouseEvent` expects it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    None,
    Left,
    Right,
    Middle,
}

impl Default for MouseButton {
    fn default() -> Self {
        MouseButton::Left
    }
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::None => "none",
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    /// Value for the protocol's `buttons` bitfield.
    pub fn buttons_mask(&self) -> u32 {
        match self {
            MouseButton::None => 0,
            MouseButton::Left => 1,
            MouseButton::Right => 2,
            MouseButton::Middle => 4,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "none" => Ok(MouseButton::None),
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(format!("unknown mouse button '{other}'")),
        }
    }
}

bitflags! {
    /// Modifier bitmask stamped on every dispatched input event.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
    pub struct Modifiers: u32 {
        const ALT = 1;
        const CONTROL = 2;
        const META = 4;
        const SHIFT = 8;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

impl Modifiers {
    /// Bit toggled by a key whose `key` value is `key`.
    pub fn for_key(key: &str) -> Modifiers {
        match key {
            "Alt" => Modifiers::ALT,
            "Control" => Modifiers::CONTROL,
            "Meta" => Modifiers::META,
            "Shift" => Modifiers::SHIFT,
            _ => Modifiers::empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseOptions {
    pub button: MouseButton,
    pub click_count: u32,
}

impl Default for MouseOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub click_count: u32,
    /// Pause between press and release.
    pub delay: Option<Duration>,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            click_count: 1,
            delay: None,
        }
    }
}

impl ClickOptions {
    pub fn mouse_options(&self) -> MouseOptions {
        MouseOptions {
            button: self.button,
            click_count: self.click_count,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeOptions {
    /// Pause between characters.
    pub delay: Option<Duration>,
}
