use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use devtools_session::CommandSender;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

use crate::error::InputError;
use crate::layout::{is_layout_char, key_definition};
use crate::model::{Modifiers, TypeOptions};

/// What a single key press looks like to the page, after applying the
/// current modifier state to the layout entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyDescription {
    pub key: String,
    pub key_code: u32,
    pub code: String,
    pub text: String,
    pub location: u32,
}

#[derive(Debug, Default)]
struct KeyboardState {
    modifiers: Modifiers,
    pressed: HashSet<String>,
}

/// Keyboard bound to one session. Its modifier state is shared with the
/// page's mouse and touchscreen.
pub struct Keyboard {
    sender: Arc<dyn CommandSender>,
    state: Mutex<KeyboardState>,
}

impl Keyboard {
    pub fn new(sender: Arc<dyn CommandSender>) -> Self {
        Self {
            sender,
            state: Mutex::new(KeyboardState::default()),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.state.lock().modifiers
    }

    /// Press `key` without releasing it. Modifier keys stay in effect for
    /// later mouse, key and touch events until [`Keyboard::up`].
    pub async fn down(&self, key: &str) -> Result<(), InputError> {
        let (description, modifiers, auto_repeat) = {
            let mut state = self.state.lock();
            let description = describe(key, state.modifiers)?;
            let auto_repeat = !state.pressed.insert(description.code.clone());
            state.modifiers |= Modifiers::for_key(&description.key);
            (description, state.modifiers, auto_repeat)
        };

        let kind = if description.text.is_empty() {
            "rawKeyDown"
        } else {
            "keyDown"
        };
        debug!(target: "input-replay", key, kind, auto_repeat, "key down");
        self.sender
            .send_command(
                "Input.dispatchKeyEvent",
                json!({
                    "type": kind,
                    "modifiers": modifiers.bits(),
                    "windowsVirtualKeyCode": description.key_code,
                    "code": description.code,
                    "key": description.key,
                    "text": description.text,
                    "unmodifiedText": description.text,
                    "autoRepeat": auto_repeat,
                    "location": description.location,
                    "isKeypad": description.location == 3,
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn up(&self, key: &str) -> Result<(), InputError> {
        let (description, modifiers) = {
            let mut state = self.state.lock();
            let description = describe(key, state.modifiers)?;
            state.modifiers &= !Modifiers::for_key(&description.key);
            state.pressed.remove(&description.code);
            (description, state.modifiers)
        };

        debug!(target: "input-replay", key, "key up");
        self.sender
            .send_command(
                "Input.dispatchKeyEvent",
                json!({
                    "type": "keyUp",
                    "modifiers": modifiers.bits(),
                    "key": description.key,
                    "windowsVirtualKeyCode": description.key_code,
                    "code": description.code,
                    "location": description.location,
                }),
            )
            .await?;
        Ok(())
    }

    /// Insert text without any key events.
    pub async fn send_character(&self, ch: &str) -> Result<(), InputError> {
        self.sender
            .send_command("Input.insertText", json!({ "text": ch }))
            .await?;
        Ok(())
    }

    pub async fn press(&self, key: &str, delay: Option<Duration>) -> Result<(), InputError> {
        self.down(key).await?;
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        self.up(key).await
    }

    /// Type `text` one character at a time. Characters the layout knows are
    /// pressed as keys; anything else is inserted directly.
    pub async fn type_text(&self, text: &str, options: TypeOptions) -> Result<(), InputError> {
        let mut buf = [0u8; 4];
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            let as_str = ch.encode_utf8(&mut buf);
            if is_layout_char(ch) {
                self.press(as_str, None).await?;
            } else {
                self.send_character(as_str).await?;
            }
            if let (Some(delay), Some(_)) = (options.delay, chars.peek()) {
                sleep(delay).await;
            }
        }
        Ok(())
    }
}

/// Resolve `key` against the US layout under `modifiers`.
pub fn describe(key: &str, modifiers: Modifiers) -> Result<KeyDescription, InputError> {
    let definition = key_definition(key).ok_or_else(|| InputError::UnknownKey(key.to_string()))?;
    let shift = modifiers.contains(Modifiers::SHIFT);

    let mut description = KeyDescription {
        key: definition.key.clone(),
        key_code: definition.key_code,
        code: definition.code.clone(),
        text: String::new(),
        location: definition.location,
    };

    if shift {
        if let Some(shift_key) = &definition.shift_key {
            description.key = shift_key.clone();
        }
        if let Some(code) = definition.shift_key_code {
            description.key_code = code;
        }
    }

    if description.key.chars().count() == 1 {
        description.text = description.key.clone();
    }
    if let Some(text) = &definition.text {
        description.text = text.clone();
    }
    if shift {
        if let Some(text) = &definition.shift_text {
            description.text = text.clone();
        }
    }

    // Chords other than shift never produce text.
    if !(modifiers - Modifiers::SHIFT).is_empty() {
        description.text.clear();
    }

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSender;

    #[test]
    fn shift_selects_shifted_key_and_text() {
        let plain = describe("KeyA", Modifiers::empty()).unwrap();
        assert_eq!((plain.key.as_str(), plain.text.as_str()), ("a", "a"));

        let shifted = describe("KeyA", Modifiers::SHIFT).unwrap();
        assert_eq!((shifted.key.as_str(), shifted.text.as_str()), ("A", "A"));

        let keypad = describe("Numpad5", Modifiers::SHIFT).unwrap();
        assert_eq!((keypad.key.as_str(), keypad.key_code), ("5", 101));
    }

    #[test]
    fn control_chords_suppress_text() {
        let chord = describe("a", Modifiers::CONTROL).unwrap();
        assert_eq!(chord.key, "a");
        assert!(chord.text.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            describe("NotAKey", Modifiers::empty()),
            Err(InputError::UnknownKey(name)) if name == "NotAKey"
        ));
    }

    #[tokio::test]
    async fn press_emits_down_then_up() {
        let sender = RecordingSender::new();
        let keyboard = Keyboard::new(sender.clone());

        keyboard.press("Enter", None).await.unwrap();

        let events = sender.params_for("Input.dispatchKeyEvent");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "keyDown");
        assert_eq!(events[0]["text"], "\r");
        assert_eq!(events[0]["windowsVirtualKeyCode"], 13);
        assert_eq!(events[1]["type"], "keyUp");
    }

    #[tokio::test]
    async fn modifiers_are_held_until_released() {
        let sender = RecordingSender::new();
        let keyboard = Keyboard::new(sender.clone());

        keyboard.down("Shift").await.unwrap();
        assert_eq!(keyboard.modifiers(), Modifiers::SHIFT);
        keyboard.press("a", None).await.unwrap();
        keyboard.up("Shift").await.unwrap();
        assert_eq!(keyboard.modifiers(), Modifiers::empty());

        let events = sender.params_for("Input.dispatchKeyEvent");
        assert_eq!(events[0]["type"], "rawKeyDown");
        assert_eq!(events[0]["modifiers"], 8);
        assert_eq!(events[1]["key"], "A");
        assert_eq!(events[1]["modifiers"], 8);
        assert_eq!(events[3]["modifiers"], 0);
    }

    #[tokio::test]
    async fn repeated_down_sets_auto_repeat() {
        let sender = RecordingSender::new();
        let keyboard = Keyboard::new(sender.clone());

        keyboard.down("ArrowDown").await.unwrap();
        keyboard.down("ArrowDown").await.unwrap();
        keyboard.up("ArrowDown").await.unwrap();
        keyboard.down("ArrowDown").await.unwrap();

        let repeats: Vec<bool> = sender
            .params_for("Input.dispatchKeyEvent")
            .iter()
            .filter(|event| event["type"] == "rawKeyDown")
            .map(|event| event["autoRepeat"].as_bool().unwrap())
            .collect();
        assert_eq!(repeats, vec![false, true, false]);
    }

    #[tokio::test]
    async fn type_text_falls_back_to_insert_text() {
        let sender = RecordingSender::new();
        let keyboard = Keyboard::new(sender.clone());

        keyboard
            .type_text("Hé", TypeOptions::default())
            .await
            .unwrap();

        let methods: Vec<String> = sender.calls().into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            methods,
            vec![
                "Input.dispatchKeyEvent",
                "Input.dispatchKeyEvent",
                "Input.insertText"
            ]
        );
        assert_eq!(sender.params_for("Input.insertText")[0]["text"], "é");
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let sender = RecordingSender::failing();
        let keyboard = Keyboard::new(sender.clone());
        assert!(matches!(
            keyboard.send_character("x").await,
            Err(InputError::Session(_))
        ));
    }
}
