//! Input replay over the DevTools `Input` domain.
//!
//! [`Keyboard`] owns the modifier state; [`Mouse`] and [`Touchscreen`] hold
//! an `Arc` to it so every event they emit carries the modifiers currently
//! held down.

pub mod error;
pub mod keyboard;
pub mod layout;
pub mod model;
pub mod mouse;
pub mod touch;

#[cfg(test)]
pub(crate) mod testing;

pub use error::InputError;
pub use keyboard::{describe, KeyDescription, Keyboard};
pub use layout::{is_layout_char, key_definition, KeyDefinition};
pub use model::{ClickOptions, Modifiers, MouseButton, MouseOptions, Point, TypeOptions};
pub use mouse::{interpolate, Mouse};
pub use touch::Touchscreen;
