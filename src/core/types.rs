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

//! src/core/types.rs
//!
//! Core type definitions for profile management
//!
//! This module defines the declarative configuration the engine works on:
//! - Identifiers for profiles, menus, slices and actions
//! - `ActivationRule`: a tagged union of context predicates
//! - `Profile`, `PieMenu`, `PieSlice` and the `ProfileRecord` bundle
//! - `ContextSnapshot`: the read-only foreground context
//!
//! All types serialise with camelCase field names so records written by the
//! editor round-trip unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a profile
    ProfileId
);
uuid_id!(
    /// Identifier of a pie menu
    PieMenuId
);
uuid_id!(
    /// Identifier of a pie slice
    PieSliceId
);
uuid_id!(
    /// Identifier of a bound action (executed elsewhere)
    ActionId
);

/// Axis-aligned rectangle in virtual screen coordinates.
///
/// Width and height are signed so that malformed input survives
/// deserialisation and can be reported by validation instead.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// True when both dimensions are strictly positive.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Overlap test with a positive-area intersection.
    ///
    /// Rectangles that merely share an edge do not intersect. Containment in
    /// either direction is a special case of intersection.
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        if !self.has_area() || !other.has_area() {
            return false;
        }

        let (ax0, ay0) = (i64::from(self.x), i64::from(self.y));
        let (ax1, ay1) = (ax0 + i64::from(self.width), ay0 + i64::from(self.height));
        let (bx0, by0) = (i64::from(other.x), i64::from(other.y));
        let (bx1, by1) = (bx0 + i64::from(other.width), by0 + i64::from(other.height));

        ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
    }
}

impl fmt::Display for ScreenRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}:{}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Point-in-time description of the foreground window.
///
/// Produced by an external poller; the engine only reads it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub window_title: Option<String>,
    #[serde(default)]
    pub window_class: Option<String>,
    /// Window (or cursor) rectangle used by screen-area rules
    #[serde(default)]
    pub screen_rect: Option<ScreenRect>,
    #[serde(default)]
    pub fullscreen: bool,
    /// Capture time in milliseconds since the Unix epoch
    #[serde(default)]
    pub captured_at_ms: i64,
}

impl ContextSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot stamped with the current wall-clock time.
    pub fn now() -> Self {
        Self {
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
            ..Self::default()
        }
    }

    pub fn with_process(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.window_class = Some(class.into());
        self
    }

    pub fn with_rect(mut self, rect: ScreenRect) -> Self {
        self.screen_rect = Some(rect);
        self
    }

    /// Equality ignoring the capture timestamp.
    ///
    /// Pollers re-emit identical snapshots every tick; only a change in the
    /// observed window should trigger re-resolution.
    pub fn same_window(&self, other: &ContextSnapshot) -> bool {
        self.process_name == other.process_name
            && self.window_title == other.window_title
            && self.window_class == other.window_class
            && self.screen_rect == other.screen_rect
            && self.fullscreen == other.fullscreen
    }
}

/// Rule mode names as they appear in persisted records.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Always,
    ProcessName,
    WindowTitle,
    WindowClass,
    ScreenArea,
    Custom,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMode::Always => "always",
            MatchMode::ProcessName => "process_name",
            MatchMode::WindowTitle => "window_title",
            MatchMode::WindowClass => "window_class",
            MatchMode::ScreenArea => "screen_area",
            MatchMode::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Text pattern with its matching flags.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPattern {
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl TextPattern {
    /// Literal, case-insensitive pattern.
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            case_sensitive: false,
        }
    }

    /// Regex pattern, case-insensitive.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: true,
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

/// What a rule tests, tagged by `mode`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RuleMatcher {
    Always,
    ProcessName(TextPattern),
    WindowTitle(TextPattern),
    WindowClass(TextPattern),
    ScreenArea(ScreenRect),
    /// Pattern tested against process name, window title and window class
    Custom(TextPattern),
}

impl RuleMatcher {
    pub fn mode(&self) -> MatchMode {
        match self {
            RuleMatcher::Always => MatchMode::Always,
            RuleMatcher::ProcessName(_) => MatchMode::ProcessName,
            RuleMatcher::WindowTitle(_) => MatchMode::WindowTitle,
            RuleMatcher::WindowClass(_) => MatchMode::WindowClass,
            RuleMatcher::ScreenArea(_) => MatchMode::ScreenArea,
            RuleMatcher::Custom(_) => MatchMode::Custom,
        }
    }

    /// The text pattern, for modes that carry one.
    pub fn pattern(&self) -> Option<&TextPattern> {
        match self {
            RuleMatcher::ProcessName(p)
            | RuleMatcher::WindowTitle(p)
            | RuleMatcher::WindowClass(p)
            | RuleMatcher::Custom(p) => Some(p),
            RuleMatcher::Always | RuleMatcher::ScreenArea(_) => None,
        }
    }
}

/// A predicate over the foreground context.
///
/// # Example
/// ```
/// use radial_profiles::core::{ActivationRule, TextPattern};
///
/// let rule = ActivationRule::process_name(TextPattern::literal("chrome.exe"));
/// assert!(!rule.negate);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRule {
    #[serde(flatten)]
    pub matcher: RuleMatcher,
    /// Inverts the per-rule outcome
    #[serde(default)]
    pub negate: bool,
}

impl ActivationRule {
    pub fn new(matcher: RuleMatcher) -> Self {
        Self {
            matcher,
            negate: false,
        }
    }

    pub fn always() -> Self {
        Self::new(RuleMatcher::Always)
    }

    pub fn process_name(pattern: TextPattern) -> Self {
        Self::new(RuleMatcher::ProcessName(pattern))
    }

    pub fn window_title(pattern: TextPattern) -> Self {
        Self::new(RuleMatcher::WindowTitle(pattern))
    }

    pub fn window_class(pattern: TextPattern) -> Self {
        Self::new(RuleMatcher::WindowClass(pattern))
    }

    pub fn screen_area(rect: ScreenRect) -> Self {
        Self::new(RuleMatcher::ScreenArea(rect))
    }

    pub fn custom(pattern: TextPattern) -> Self {
        Self::new(RuleMatcher::Custom(pattern))
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.matcher.mode()
    }
}

fn default_enabled() -> bool {
    true
}

/// A named, independently activatable configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Accelerator that opens this profile's menu
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_hotkey: Option<String>,
    /// Evaluated in order, first match wins
    #[serde(default)]
    pub activation_rules: Vec<ActivationRule>,
    pub root_menu: PieMenuId,
}

impl Profile {
    pub fn new(name: impl Into<String>, root_menu: PieMenuId) -> Self {
        Self {
            id: ProfileId::new(),
            name: name.into(),
            description: None,
            enabled: true,
            global_hotkey: None,
            activation_rules: Vec::new(),
            root_menu,
        }
    }
}

/// A radial menu: an ordered ring of slices.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieMenu {
    pub id: PieMenuId,
    pub title: String,
    #[serde(default)]
    pub slices: Vec<PieSlice>,
}

impl PieMenu {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: PieMenuId::new(),
            title: title.into(),
            slices: Vec::new(),
        }
    }

    /// Slices sorted by their order index.
    pub fn ordered_slices(&self) -> Vec<&PieSlice> {
        let mut slices: Vec<&PieSlice> = self.slices.iter().collect();
        slices.sort_by_key(|slice| slice.order);
        slices
    }
}

/// One wedge of a pie menu.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSlice {
    pub id: PieSliceId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_menu: Option<PieMenuId>,
    #[serde(default)]
    pub order: u32,
}

/// What activating a slice does.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum SliceTarget {
    /// Navigate into a child menu
    Submenu(PieMenuId),
    /// Run a leaf action
    Action(ActionId),
    /// Neither set (still being drafted)
    Unassigned,
}

impl PieSlice {
    pub fn action(label: impl Into<String>, action: ActionId, order: u32) -> Self {
        Self {
            id: PieSliceId::new(),
            label: label.into(),
            hotkey: None,
            action: Some(action),
            child_menu: None,
            order,
        }
    }

    pub fn submenu(label: impl Into<String>, child: PieMenuId, order: u32) -> Self {
        Self {
            id: PieSliceId::new(),
            label: label.into(),
            hotkey: None,
            action: None,
            child_menu: Some(child),
            order,
        }
    }

    /// Effective target. A child menu takes precedence over an action.
    pub fn target(&self) -> SliceTarget {
        match (self.child_menu, self.action) {
            (Some(child), _) => SliceTarget::Submenu(child),
            (None, Some(action)) => SliceTarget::Action(action),
            (None, None) => SliceTarget::Unassigned,
        }
    }
}

/// A profile bundled with the menus it owns.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub profile: Profile,
    #[serde(default)]
    pub menus: Vec<PieMenu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfileRecord {
    pub fn new(profile: Profile, menus: Vec<PieMenu>) -> Self {
        Self {
            profile,
            menus,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn id(&self) -> ProfileId {
        self.profile.id
    }

    pub fn menu(&self, id: PieMenuId) -> Option<&PieMenu> {
        self.menus.iter().find(|menu| menu.id == id)
    }

    pub fn root_menu(&self) -> Option<&PieMenu> {
        self.menu(self.profile.root_menu)
    }

    /// All slices across every menu of the record.
    pub fn slices(&self) -> impl Iterator<Item = &PieSlice> {
        self.menus.iter().flat_map(|menu| menu.slices.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_menu_wins_over_action() {
        let mut slice = PieSlice::action("Open", ActionId::new(), 0);
        let child = PieMenuId::new();
        slice.child_menu = Some(child);

        assert_eq!(slice.target(), SliceTarget::Submenu(child));
    }

    #[test]
    fn test_unassigned_slice() {
        let mut slice = PieSlice::action("Draft", ActionId::new(), 0);
        slice.action = None;
        assert_eq!(slice.target(), SliceTarget::Unassigned);
    }

    #[test]
    fn test_rule_serialises_as_tagged_union() {
        let rule = ActivationRule::window_title(TextPattern::regex("^Visual Studio")).negated();
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["mode"], "window_title");
        assert_eq!(json["pattern"], "^Visual Studio");
        assert_eq!(json["isRegex"], true);
        assert_eq!(json["negate"], true);

        let back: ActivationRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_always_rule_serialises_without_payload() {
        let json = serde_json::to_string(&ActivationRule::always()).unwrap();
        assert!(json.contains("\"mode\":\"always\""));

        let back: ActivationRule = serde_json::from_str(r#"{"mode":"always"}"#).unwrap();
        assert_eq!(back, ActivationRule::always());
    }

    #[test]
    fn test_screen_rect_display_uses_legacy_layout() {
        assert_eq!(ScreenRect::new(-10, 20, 300, 400).to_string(), "-10x20:300x400");
    }

    #[test]
    fn test_same_window_ignores_timestamp() {
        let a = ContextSnapshot::empty().with_process("code.exe");
        let mut b = a.clone();
        b.captured_at_ms = 42;

        assert!(a.same_window(&b));
        assert!(!a.same_window(&b.with_title("changed")));
    }
}
