// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! src/core/accelerator.rs
//!
//! Global shortcut (accelerator) parsing and normalisation
//!
//! Accelerators arrive as free-form strings from the editor, e.g.
//! `"Ctrl+Alt+Space"` or `"alt + control + space"`. Both must compare equal
//! when checking for duplicate bindings, so every string is parsed into a
//! normalised [`Accelerator`]:
//! - Modifiers deduplicated and sorted (Ctrl, Alt, Shift, Super)
//! - Key name canonicalised (letters upper case, named keys mapped)
//!
//! # Architecture
//! Tokenisation uses nom combinators; classification of tokens into
//! modifiers and the single key happens afterwards on plain strings.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    multi::separated_list1,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Accelerator parse errors
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AcceleratorError {
    #[error("Accelerator is empty")]
    Empty,

    #[error("Malformed accelerator '{0}'")]
    Malformed(String),

    #[error("Unknown key '{0}'")]
    UnknownKey(String),

    #[error("Accelerator '{0}' has no key, only modifiers")]
    MissingKey(String),

    #[error("Accelerator '{accelerator}' has more than one key ('{first}' and '{second}')")]
    MultipleKeys {
        accelerator: String,
        first: String,
        second: String,
    },
}

/// Keyboard modifier keys
///
/// Declaration order is the canonical display order.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Modifier {
    /// Control key
    Ctrl,
    /// Alt/Option key
    Alt,
    /// Shift key
    Shift,
    /// Super/Windows/Command key
    Super,
}

impl Modifier {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "CTRL" | "CONTROL" => Some(Modifier::Ctrl),
            "ALT" | "OPTION" => Some(Modifier::Alt),
            "SHIFT" => Some(Modifier::Shift),
            "SUPER" | "WIN" | "WINDOWS" | "META" | "CMD" | "COMMAND" => Some(Modifier::Super),
            "COMMANDORCONTROL" | "CMDORCTRL" | "COMMANDORCTRL" | "CMDORCONTROL" => {
                Some(Self::command_or_control())
            }
            _ => None,
        }
    }

    #[cfg(target_os = "macos")]
    fn command_or_control() -> Self {
        Modifier::Super
    }

    #[cfg(not(target_os = "macos"))]
    fn command_or_control() -> Self {
        Modifier::Ctrl
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Super => write!(f, "Super"),
        }
    }
}

/// A normalised keyboard shortcut
///
/// Implements Hash and Eq on the normalised form, so it can key the
/// registry's uniqueness index directly.
///
/// # Example
/// ```
/// use radial_profiles::core::Accelerator;
///
/// let a: Accelerator = "Ctrl+Alt+Space".parse()?;
/// let b: Accelerator = "alt + control + space".parse()?;
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "Ctrl+Alt+Space");
/// # Ok::<(), radial_profiles::core::AcceleratorError>(())
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Accelerator {
    /// Sorted, deduplicated modifiers
    pub modifiers: Vec<Modifier>,
    /// Canonical key name
    pub key: String,
}

impl Accelerator {
    /// Builds an accelerator from parts, normalising both.
    pub fn new(mut modifiers: Vec<Modifier>, key: &str) -> Result<Self, AcceleratorError> {
        modifiers.sort();
        modifiers.dedup();

        let key = canonical_key(key).ok_or_else(|| AcceleratorError::UnknownKey(key.to_string()))?;

        Ok(Self { modifiers, key })
    }

    /// Parses and normalises an accelerator string.
    pub fn parse(input: &str) -> Result<Self, AcceleratorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AcceleratorError::Empty);
        }

        let tokens = match tokenize(trimmed) {
            Ok(("", tokens)) => tokens,
            _ => return Err(AcceleratorError::Malformed(trimmed.to_string())),
        };

        let mut modifiers = Vec::new();
        let mut key: Option<&str> = None;

        for token in tokens {
            if let Some(modifier) = Modifier::from_token(token) {
                modifiers.push(modifier);
                continue;
            }

            if let Some(first) = key {
                return Err(AcceleratorError::MultipleKeys {
                    accelerator: trimmed.to_string(),
                    first: first.to_string(),
                    second: token.to_string(),
                });
            }
            key = Some(token);
        }

        let key = key.ok_or_else(|| AcceleratorError::MissingKey(trimmed.to_string()))?;
        Self::new(modifiers, key)
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

impl FromStr for Accelerator {
    type Err = AcceleratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Splits `A + B+C` into `["A", "B", "C"]`.
///
/// Fails on empty segments such as a dangling `+`.
fn tokenize(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(
        (space0, char('+'), space0),
        take_while1(|c: char| c != '+' && !c.is_whitespace()),
    )
    .parse(input)
}

/// Named keys and their aliases, mapped to the canonical spelling.
const NAMED_KEYS: &[(&str, &[&str])] = &[
    ("Space", &["SPACE", "SPACEBAR"]),
    ("Tab", &["TAB"]),
    ("Enter", &["ENTER", "RETURN"]),
    ("Escape", &["ESCAPE", "ESC"]),
    ("Backspace", &["BACKSPACE"]),
    ("Delete", &["DELETE", "DEL"]),
    ("Insert", &["INSERT", "INS"]),
    ("Home", &["HOME"]),
    ("End", &["END"]),
    ("PageUp", &["PAGEUP", "PGUP", "PRIOR"]),
    ("PageDown", &["PAGEDOWN", "PGDN", "NEXT"]),
    ("Up", &["UP", "ARROWUP"]),
    ("Down", &["DOWN", "ARROWDOWN"]),
    ("Left", &["LEFT", "ARROWLEFT"]),
    ("Right", &["RIGHT", "ARROWRIGHT"]),
    ("Plus", &["PLUS"]),
    ("Minus", &["MINUS"]),
    ("PrintScreen", &["PRINTSCREEN", "PRTSC", "PRINT"]),
    ("Pause", &["PAUSE"]),
    ("CapsLock", &["CAPSLOCK"]),
    ("NumLock", &["NUMLOCK"]),
    ("ScrollLock", &["SCROLLLOCK"]),
    ("MediaPlayPause", &["MEDIAPLAYPAUSE"]),
    ("MediaNextTrack", &["MEDIANEXTTRACK"]),
    ("MediaPrevTrack", &["MEDIAPREVTRACK", "MEDIAPREVIOUSTRACK"]),
    ("VolumeUp", &["VOLUMEUP", "AUDIOVOLUMEUP"]),
    ("VolumeDown", &["VOLUMEDOWN", "AUDIOVOLUMEDOWN"]),
    ("VolumeMute", &["VOLUMEMUTE", "AUDIOVOLUMEMUTE"]),
];

const PUNCTUATION: &str = "`-=[]\\;',./";

fn canonical_key(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }

    let mut chars = upper.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() || PUNCTUATION.contains(c) {
            return Some(c.to_string());
        }
        return None;
    }

    // Web-style codes: KeyA, Digit1
    if let Some(rest) = upper.strip_prefix("KEY") {
        if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(rest.to_string());
        }
    }
    if let Some(rest) = upper.strip_prefix("DIGIT") {
        if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
            return Some(rest.to_string());
        }
    }

    if let Some(number) = upper.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&number) {
            return Some(format!("F{}", number));
        }
    }

    for prefix in ["NUMPAD", "NUM"] {
        if let Some(rest) = upper.strip_prefix(prefix) {
            if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
                return Some(format!("Num{}", rest));
            }
        }
    }

    NAMED_KEYS
        .iter()
        .find(|(_, aliases)| aliases.contains(&upper.as_str()))
        .map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_tolerates_spaces() {
        let (rest, tokens) = tokenize("Ctrl + Alt+Space").unwrap();
        assert_eq!(rest, "");
        assert_eq!(tokens, vec!["Ctrl", "Alt", "Space"]);
    }

    #[test]
    fn test_tokenize_leaves_dangling_plus() {
        let (rest, _) = tokenize("Ctrl+").unwrap();
        assert_eq!(rest, "+");
    }

    #[test]
    fn test_canonical_keys() {
        assert_eq!(canonical_key("a"), Some("A".to_string()));
        assert_eq!(canonical_key("return"), Some("Enter".to_string()));
        assert_eq!(canonical_key("f12"), Some("F12".to_string()));
        assert_eq!(canonical_key("F25"), None);
        assert_eq!(canonical_key("KeyQ"), Some("Q".to_string()));
        assert_eq!(canonical_key("Numpad7"), Some("Num7".to_string()));
        assert_eq!(canonical_key("Banana"), None);
    }
}
