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

//! src/core/encoding.rs
//!
//! Value-string rule encoding (schema v1 import/export path)
//!
//! Older profile files store each rule as `{mode, value, negate}` where
//! `value` packs the pattern and its flags into one string:
//! - plain `chrome.exe` for literal, case-insensitive patterns
//! - `regex:<pattern>` for case-insensitive regexes
//! - `json:{"version":1,"pattern":..,"isRegex":..,"caseSensitive":..,"screenArea":..}`
//!   for everything else
//! - legacy `<x>x<y>:<w>x<h>` for screen areas
//!
//! Some writers also put `isRegex`, `caseSensitive` and `screenArea` next to
//! the value. Those side fields apply unless a `json:` envelope carries its
//! own flags, and `screenArea` stands in for a missing or unreadable
//! rectangle. An envelope without `version` is read as version 1.
//!
//! The evaluator never sees these strings: they are converted to and from
//! [`ActivationRule`] here only.

use nom::{
    character::complete::{char, i32 as parse_i32},
    combinator::all_consuming,
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ActivationRule, MatchMode, RuleMatcher, ScreenRect, TextPattern};

const REGEX_PREFIX: &str = "regex:";
const JSON_PREFIX: &str = "json:";

/// Envelope version written by [`encode_rule`].
pub const ENVELOPE_VERSION: u32 = 1;

/// Rule as persisted in schema v1 files
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRule {
    pub mode: MatchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_regex: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_area: Option<ScreenRect>,
}

impl StoredRule {
    pub fn new(mode: MatchMode, value: Option<String>) -> Self {
        Self {
            mode,
            value,
            negate: None,
            is_regex: None,
            case_sensitive: None,
            screen_area: None,
        }
    }

    /// The value, unless it is missing or blank.
    fn present_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(default)]
    pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_regex: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    screen_area: Option<ScreenRect>,
}

/// Decoding errors for stored rules
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Rule mode '{0}' requires a value")]
    MissingValue(MatchMode),

    #[error("Invalid json envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u32),

    #[error("Screen area rule has no rectangle")]
    MissingScreenArea,

    #[error("Invalid screen area '{0}', expected <x>x<y>:<w>x<h>")]
    InvalidScreenArea(String),
}

/// Encodes a rule into its stored form, choosing the simplest encoding.
pub fn encode_rule(rule: &ActivationRule) -> StoredRule {
    let value = match &rule.matcher {
        RuleMatcher::Always => None,
        RuleMatcher::ScreenArea(area) => Some(envelope(&TextPattern::default(), Some(*area))),
        RuleMatcher::ProcessName(pattern)
        | RuleMatcher::WindowTitle(pattern)
        | RuleMatcher::WindowClass(pattern)
        | RuleMatcher::Custom(pattern) => Some(encode_pattern(pattern, rule.negate)),
    };

    StoredRule {
        negate: rule.negate.then_some(true),
        ..StoredRule::new(rule.mode(), value)
    }
}

fn encode_pattern(pattern: &TextPattern, negate: bool) -> String {
    let prefixed = pattern.pattern.starts_with(REGEX_PREFIX) || pattern.pattern.starts_with(JSON_PREFIX);

    if negate || pattern.case_sensitive || prefixed {
        envelope(pattern, None)
    } else if pattern.is_regex {
        format!("{}{}", REGEX_PREFIX, pattern.pattern)
    } else {
        pattern.pattern.clone()
    }
}

fn envelope(pattern: &TextPattern, screen_area: Option<ScreenRect>) -> String {
    let envelope = Envelope {
        version: Some(ENVELOPE_VERSION),
        pattern: pattern.pattern.clone(),
        is_regex: Some(pattern.is_regex),
        case_sensitive: Some(pattern.case_sensitive),
        screen_area,
    };
    // Serialising a plain struct of strings, bools and ints cannot fail
    let payload = serde_json::to_string(&envelope).unwrap_or_default();
    format!("{}{}", JSON_PREFIX, payload)
}

/// Decodes any of the accepted stored forms.
///
/// # Example
/// ```
/// use radial_profiles::core::encoding::{decode_rule, StoredRule};
/// use radial_profiles::core::{MatchMode, RuleMatcher, ScreenRect};
///
/// let stored = StoredRule::new(MatchMode::ScreenArea, Some("0x0:1920x1080".to_string()));
/// let rule = decode_rule(&stored)?;
/// assert_eq!(rule.matcher, RuleMatcher::ScreenArea(ScreenRect::new(0, 0, 1920, 1080)));
/// # Ok::<(), radial_profiles::core::encoding::DecodeError>(())
/// ```
pub fn decode_rule(stored: &StoredRule) -> Result<ActivationRule, DecodeError> {
    let negate = stored.negate.unwrap_or(false);

    if stored.mode == MatchMode::Always {
        return Ok(ActivationRule {
            matcher: RuleMatcher::Always,
            negate,
        });
    }

    let matcher = if stored.mode == MatchMode::ScreenArea {
        RuleMatcher::ScreenArea(decode_screen_area(stored)?)
    } else {
        let pattern = decode_pattern(stored)?;
        match stored.mode {
            MatchMode::ProcessName => RuleMatcher::ProcessName(pattern),
            MatchMode::WindowTitle => RuleMatcher::WindowTitle(pattern),
            MatchMode::WindowClass => RuleMatcher::WindowClass(pattern),
            _ => RuleMatcher::Custom(pattern),
        }
    };

    Ok(ActivationRule { matcher, negate })
}

fn decode_pattern(stored: &StoredRule) -> Result<TextPattern, DecodeError> {
    let value = stored
        .present_value()
        .ok_or(DecodeError::MissingValue(stored.mode))?;
    let case_sensitive = stored.case_sensitive.unwrap_or(false);

    if let Some(payload) = value.strip_prefix(JSON_PREFIX) {
        // Envelope flags replace the side fields
        let envelope = parse_envelope(payload)?;
        return Ok(TextPattern {
            pattern: envelope.pattern,
            is_regex: envelope.is_regex.unwrap_or(false),
            case_sensitive: envelope.case_sensitive.unwrap_or(false),
        });
    }

    if let Some(pattern) = value.strip_prefix(REGEX_PREFIX) {
        return Ok(TextPattern {
            pattern: pattern.to_string(),
            is_regex: true,
            case_sensitive,
        });
    }

    Ok(TextPattern {
        pattern: value.to_string(),
        is_regex: stored.is_regex.unwrap_or(false),
        case_sensitive,
    })
}

fn decode_screen_area(stored: &StoredRule) -> Result<ScreenRect, DecodeError> {
    let Some(value) = stored.present_value() else {
        return stored.screen_area.ok_or(DecodeError::MissingScreenArea);
    };

    if let Some(payload) = value.strip_prefix(JSON_PREFIX) {
        return parse_envelope(payload)?
            .screen_area
            .or(stored.screen_area)
            .ok_or(DecodeError::MissingScreenArea);
    }

    match parse_screen_area(value) {
        Ok(rect) => Ok(rect),
        Err(e) => stored.screen_area.ok_or(e),
    }
}

/// Parses the legacy `<x>x<y>:<w>x<h>` layout, e.g. `-1920x0:1920x1080`.
pub fn parse_screen_area(value: &str) -> Result<ScreenRect, DecodeError> {
    all_consuming(legacy_screen_area)
        .parse(value.trim())
        .map(|(_, rect)| rect)
        .map_err(|_| DecodeError::InvalidScreenArea(value.to_string()))
}

fn parse_envelope(payload: &str) -> Result<Envelope, DecodeError> {
    let envelope: Envelope =
        serde_json::from_str(payload).map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))?;

    match envelope.version {
        Some(version) if version != ENVELOPE_VERSION => Err(DecodeError::UnsupportedVersion(version)),
        _ => Ok(envelope),
    }
}

fn signed(input: &str) -> IResult<&str, i32> {
    parse_i32(input)
}

/// Parses `<x>x<y>:<w>x<h>`, e.g. `-1920x0:1920x1080`.
fn legacy_screen_area(input: &str) -> IResult<&str, ScreenRect> {
    let (input, (x, _, y, _, width, _, height)) =
        (signed, char('x'), signed, char(':'), signed, char('x'), signed).parse(input)?;

    Ok((input, ScreenRect { x, y, width, height }))
}
