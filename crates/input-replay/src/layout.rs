//! US keyboard layout.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// One entry of the layout: what the browser should see when a named key or
/// printable character is pressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key_code: u32,
    pub shift_key_code: Option<u32>,
    pub key: String,
    pub shift_key: Option<String>,
    pub code: String,
    pub text: Option<String>,
    pub shift_text: Option<String>,
    /// 0 standard, 1 left, 2 right, 3 numpad.
    pub location: u32,
}

impl KeyDefinition {
    fn new(key_code: u32, code: &str, key: &str) -> Self {
        Self {
            key_code,
            key: key.to_string(),
            code: code.to_string(),
            ..Default::default()
        }
    }

    fn shifted(mut self, shift_key: &str) -> Self {
        self.shift_key = Some(shift_key.to_string());
        self
    }

    fn shift_key_code(mut self, key_code: u32) -> Self {
        self.shift_key_code = Some(key_code);
        self
    }

    fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    fn at(mut self, location: u32) -> Self {
        self.location = location;
        self
    }
}

static US_LAYOUT: Lazy<HashMap<String, KeyDefinition>> = Lazy::new(build_us_layout);

pub fn key_definition(name: &str) -> Option<&'static KeyDefinition> {
    US_LAYOUT.get(name)
}

/// Whether `ch` can be produced by pressing a key of the layout.
pub fn is_layout_char(ch: char) -> bool {
    let mut buf = [0u8; 4];
    US_LAYOUT.contains_key(&*ch.encode_utf8(&mut buf))
}

// (code, keyCode, key, location)
const CODE_KEYS: &[(&str, u32, &str, u32)] = &[
    ("Abort", 3, "Cancel", 0),
    ("Help", 6, "Help", 0),
    ("Backspace", 8, "Backspace", 0),
    ("Tab", 9, "Tab", 0),
    ("ShiftLeft", 16, "Shift", 1),
    ("ShiftRight", 16, "Shift", 2),
    ("ControlLeft", 17, "Control", 1),
    ("ControlRight", 17, "Control", 2),
    ("AltLeft", 18, "Alt", 1),
    ("AltRight", 18, "Alt", 2),
    ("Pause", 19, "Pause", 0),
    ("CapsLock", 20, "CapsLock", 0),
    ("Escape", 27, "Escape", 0),
    ("Convert", 28, "Convert", 0),
    ("NonConvert", 29, "NonConvert", 0),
    ("PageUp", 33, "PageUp", 0),
    ("PageDown", 34, "PageDown", 0),
    ("End", 35, "End", 0),
    ("Home", 36, "Home", 0),
    ("ArrowLeft", 37, "ArrowLeft", 0),
    ("ArrowUp", 38, "ArrowUp", 0),
    ("ArrowRight", 39, "ArrowRight", 0),
    ("ArrowDown", 40, "ArrowDown", 0),
    ("Select", 41, "Select", 0),
    ("Open", 43, "Execute", 0),
    ("PrintScreen", 44, "PrintScreen", 0),
    ("Insert", 45, "Insert", 0),
    ("Delete", 46, "Delete", 0),
    ("MetaLeft", 91, "Meta", 1),
    ("MetaRight", 92, "Meta", 2),
    ("ContextMenu", 93, "ContextMenu", 0),
    ("NumLock", 144, "NumLock", 0),
    ("ScrollLock", 145, "ScrollLock", 0),
    ("AltGraph", 225, "AltGraph", 0),
];

// Names that resolve to the left-hand (or only) physical key.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("Cancel", "Abort"),
    ("Shift", "ShiftLeft"),
    ("Control", "ControlLeft"),
    ("Alt", "AltLeft"),
    ("Meta", "MetaLeft"),
    ("Execute", "Open"),
];

// (code, keyCode, shiftKeyCode, key, shiftKey)
const NUMPAD_NAV: &[(&str, u32, u32, &str, &str)] = &[
    ("Numpad0", 45, 96, "Insert", "0"),
    ("Numpad1", 35, 97, "End", "1"),
    ("Numpad2", 40, 98, "ArrowDown", "2"),
    ("Numpad3", 34, 99, "PageDown", "3"),
    ("Numpad4", 37, 100, "ArrowLeft", "4"),
    ("Numpad5", 12, 101, "Clear", "5"),
    ("Numpad6", 39, 102, "ArrowRight", "6"),
    ("Numpad7", 36, 103, "Home", "7"),
    ("Numpad8", 38, 104, "ArrowUp", "8"),
    ("Numpad9", 33, 105, "PageUp", "9"),
    ("NumpadDecimal", 46, 110, "\u{0000}", "."),
];

const NUMPAD_OPS: &[(&str, u32, &str)] = &[
    ("NumpadMultiply", 106, "*"),
    ("NumpadAdd", 107, "+"),
    ("NumpadSubtract", 109, "-"),
    ("NumpadDivide", 111, "/"),
];

// (code, keyCode, key, shiftKey)
const PUNCTUATION: &[(&str, u32, &str, &str)] = &[
    ("Semicolon", 186, ";", ":"),
    ("Equal", 187, "=", "+"),
    ("Comma", 188, ",", "<"),
    ("Minus", 189, "-", "_"),
    ("Period", 190, ".", ">"),
    ("Slash", 191, "/", "?"),
    ("Backquote", 192, "`", "~"),
    ("BracketLeft", 219, "[", "{"),
    ("Backslash", 220, "\\", "|"),
    ("BracketRight", 221, "]", "}"),
    ("Quote", 222, "'", "\""),
];

const DIGIT_SHIFTS: [&str; 10] = [")", "!", "@", "#", "$", "%", "^", "&", "*", "("];

fn put(layout: &mut HashMap<String, KeyDefinition>, name: &str, definition: KeyDefinition) {
    layout.insert(name.to_string(), definition);
}

fn build_us_layout() -> HashMap<String, KeyDefinition> {
    let mut layout = HashMap::new();

    for (code, key_code, key, location) in CODE_KEYS {
        put(
            &mut layout,
            code,
            KeyDefinition::new(*key_code, code, key).at(*location),
        );
    }

    let enter = KeyDefinition::new(13, "Enter", "Enter").text("\r");
    put(&mut layout, "Enter", enter.clone());
    put(&mut layout, "\r", enter.clone());
    put(&mut layout, "\n", enter);
    put(
        &mut layout,
        "NumpadEnter",
        KeyDefinition::new(13, "NumpadEnter", "Enter").text("\r").at(3),
    );

    let space = KeyDefinition::new(32, "Space", " ");
    put(&mut layout, "Space", space.clone());
    put(&mut layout, " ", space);

    for (code, key_code, shift_key_code, key, shift_key) in NUMPAD_NAV {
        put(
            &mut layout,
            code,
            KeyDefinition::new(*key_code, code, key)
                .shift_key_code(*shift_key_code)
                .shifted(shift_key)
                .at(3),
        );
    }
    put(&mut layout, "Clear", KeyDefinition::new(12, "Numpad5", "Clear").at(3));

    for (code, key_code, key) in NUMPAD_OPS {
        put(&mut layout, code, KeyDefinition::new(*key_code, code, key).at(3));
    }
    put(&mut layout, "*", KeyDefinition::new(106, "NumpadMultiply", "*").at(3));

    for n in 1..=24u32 {
        let name = format!("F{n}");
        put(&mut layout, &name, KeyDefinition::new(111 + n, &name, &name));
    }

    for (digit, shift_key) in DIGIT_SHIFTS.iter().enumerate() {
        let key_code = 48 + digit as u32;
        let key = digit.to_string();
        let code = format!("Digit{digit}");
        put(
            &mut layout,
            &code,
            KeyDefinition::new(key_code, &code, &key).shifted(shift_key),
        );
        put(&mut layout, &key, KeyDefinition::new(key_code, &code, &key));
    }

    for (code, key_code, key, shift_key) in PUNCTUATION {
        put(
            &mut layout,
            code,
            KeyDefinition::new(*key_code, code, key).shifted(shift_key),
        );
        put(&mut layout, key, KeyDefinition::new(*key_code, code, key));
    }

    for (offset, lower) in ('a'..='z').enumerate() {
        let key_code = 65 + offset as u32;
        let lower = lower.to_string();
        let upper = lower.to_ascii_uppercase();
        let code = format!("Key{upper}");
        put(
            &mut layout,
            &code,
            KeyDefinition::new(key_code, &code, &lower).shifted(&upper),
        );
        put(&mut layout, &lower, KeyDefinition::new(key_code, &code, &lower));
        put(&mut layout, &upper, KeyDefinition::new(key_code, &code, &upper));
    }

    // Shifted characters resolve to their physical key unless claimed above.
    let shifted_chars: Vec<(String, KeyDefinition)> = DIGIT_SHIFTS
        .iter()
        .enumerate()
        .map(|(digit, shift_key)| (digit as u32 + 48, format!("Digit{digit}"), *shift_key))
        .chain(
            PUNCTUATION
                .iter()
                .map(|(code, key_code, _, shift_key)| (*key_code, code.to_string(), *shift_key)),
        )
        .map(|(key_code, code, shift_key)| {
            (
                shift_key.to_string(),
                KeyDefinition::new(key_code, &code, shift_key),
            )
        })
        .collect();

    for (name, definition) in shifted_chars {
        layout.entry(name).or_insert(definition);
    }

    for (alias, code) in KEY_ALIASES {
        if let Some(definition) = layout.get(*code).cloned() {
            layout.insert(alias.to_string(), definition);
        }
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_carry_shift_variants() {
        let key_a = key_definition("KeyA").unwrap();
        assert_eq!(key_a.key_code, 65);
        assert_eq!(key_a.key, "a");
        assert_eq!(key_a.shift_key.as_deref(), Some("A"));
        assert_eq!(key_definition("Z").unwrap().code, "KeyZ");
    }

    #[test]
    fn shifted_punctuation_maps_to_physical_key() {
        assert_eq!(key_definition("?").unwrap().code, "Slash");
        assert_eq!(key_definition("!").unwrap().code, "Digit1");
        assert_eq!(key_definition("+").unwrap().code, "Equal");
        assert_eq!(key_definition("*").unwrap().code, "NumpadMultiply");
    }

    #[test]
    fn aliases_and_specials_resolve() {
        let shift = key_definition("Shift").unwrap();
        assert_eq!((shift.code.as_str(), shift.location), ("ShiftLeft", 1));
        assert_eq!(key_definition("\n").unwrap().text.as_deref(), Some("\r"));
        assert_eq!(key_definition("F12").unwrap().key_code, 123);
        assert_eq!(key_definition("Numpad5").unwrap().shift_key_code, Some(101));
        assert!(key_definition("Hyper").is_none());
    }

    #[test]
    fn layout_chars_cover_printable_ascii() {
        for ch in (0x20u8..0x7f).map(char::from) {
            assert!(is_layout_char(ch), "{ch:?} missing from layout");
        }
        assert!(!is_layout_char('é'));
    }
}
