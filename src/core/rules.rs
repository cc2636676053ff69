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

//! Activation rule evaluation
//!
//! [`evaluate`] is a total, side-effect-free function over an ordered rule
//! list and a context snapshot:
//! - Rules are tested in order; the first match wins
//! - An empty list behaves like a single `always` rule
//! - Text modes compare by literal equality unless the pattern is a regex
//! - Screen areas match on intersection, not containment
//!
//! Regexes are compiled on every evaluation. Patterns are rejected at edit
//! time by [`validate_rule`]; a pattern that still fails to compile here makes
//! its rule non-matching, whatever its `negate` flag says.

use regex::RegexBuilder;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{ActivationRule, ContextSnapshot, MatchMode, RuleMatcher, TextPattern};

/// Outcome of evaluating a rule list
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched: bool,
    /// Index of the matching rule; `None` for no match or an empty list
    pub rule_index: Option<usize>,
}

impl MatchResult {
    pub const NO_MATCH: MatchResult = MatchResult {
        matched: false,
        rule_index: None,
    };

    /// Result for an empty rule list (implicit `always`).
    pub const IMPLICIT: MatchResult = MatchResult {
        matched: true,
        rule_index: None,
    };

    fn at(index: usize) -> Self {
        Self {
            matched: true,
            rule_index: Some(index),
        }
    }
}

/// Rule validation errors, raised when a rule is created or edited
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RuleError {
    #[error("Rule {index} ({mode}): pattern cannot be empty")]
    EmptyPattern { index: usize, mode: MatchMode },

    #[error("Rule {index} ({mode}): invalid regex '{pattern}': {message}")]
    InvalidRegex {
        index: usize,
        mode: MatchMode,
        pattern: String,
        message: String,
    },

    #[error("Rule {index}: screen area needs positive width and height, got {width}x{height}")]
    InvalidScreenArea { index: usize, width: i32, height: i32 },
}

/// Evaluates `rules` against `ctx`, first match wins.
///
/// # Example
/// ```
/// use radial_profiles::core::{evaluate, ActivationRule, ContextSnapshot, TextPattern};
///
/// let rules = vec![ActivationRule::process_name(TextPattern::literal("chrome.exe"))];
/// let ctx = ContextSnapshot::empty().with_process("Chrome.exe");
///
/// let result = evaluate(&rules, &ctx);
/// assert!(result.matched);
/// assert_eq!(result.rule_index, Some(0));
/// ```
pub fn evaluate(rules: &[ActivationRule], ctx: &ContextSnapshot) -> MatchResult {
    if rules.is_empty() {
        return MatchResult::IMPLICIT;
    }

    rules
        .iter()
        .position(|rule| rule_matches(rule, ctx))
        .map(MatchResult::at)
        .unwrap_or(MatchResult::NO_MATCH)
}

/// Per-rule outcome with `negate` applied.
pub fn rule_matches(rule: &ActivationRule, ctx: &ContextSnapshot) -> bool {
    match raw_outcome(&rule.matcher, ctx) {
        Some(outcome) => outcome != rule.negate,
        // Uncompilable regex: fail safe
        None => false,
    }
}

/// Outcome before negation; `None` when the pattern cannot be evaluated.
fn raw_outcome(matcher: &RuleMatcher, ctx: &ContextSnapshot) -> Option<bool> {
    match matcher {
        RuleMatcher::Always => Some(true),
        RuleMatcher::ProcessName(pattern) => field_matches(pattern, ctx.process_name.as_deref()),
        RuleMatcher::WindowTitle(pattern) => field_matches(pattern, ctx.window_title.as_deref()),
        RuleMatcher::WindowClass(pattern) => field_matches(pattern, ctx.window_class.as_deref()),
        RuleMatcher::ScreenArea(area) => Some(
            ctx.screen_rect
                .map(|rect| rect.intersects(area))
                .unwrap_or(false),
        ),
        RuleMatcher::Custom(pattern) => {
            let mut any = false;
            for value in [
                ctx.process_name.as_deref(),
                ctx.window_title.as_deref(),
                ctx.window_class.as_deref(),
            ] {
                any |= field_matches(pattern, value)?;
            }
            Some(any)
        }
    }
}

fn field_matches(pattern: &TextPattern, value: Option<&str>) -> Option<bool> {
    let matcher = PatternMatcher::compile(pattern).ok()?;
    Some(value.map(|value| matcher.is_match(value)).unwrap_or(false))
}

/// A text pattern ready to test values.
enum PatternMatcher<'a> {
    Exact(&'a str),
    Folded(String),
    Regex(regex::Regex),
}

impl<'a> PatternMatcher<'a> {
    fn compile(pattern: &'a TextPattern) -> Result<Self, regex::Error> {
        if pattern.is_regex {
            return RegexBuilder::new(&pattern.pattern)
                .case_insensitive(!pattern.case_sensitive)
                .build()
                .map(PatternMatcher::Regex);
        }

        if pattern.case_sensitive {
            Ok(PatternMatcher::Exact(&pattern.pattern))
        } else {
            Ok(PatternMatcher::Folded(pattern.pattern.to_lowercase()))
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            PatternMatcher::Exact(expected) => value == *expected,
            PatternMatcher::Folded(expected) => value.to_lowercase() == *expected,
            PatternMatcher::Regex(regex) => regex.is_match(value),
        }
    }
}

/// Validates a single rule before it is accepted into a profile.
pub fn validate_rule(index: usize, rule: &ActivationRule) -> Result<(), RuleError> {
    let mode = rule.mode();

    if let RuleMatcher::ScreenArea(area) = &rule.matcher {
        if !area.has_area() {
            return Err(RuleError::InvalidScreenArea {
                index,
                width: area.width,
                height: area.height,
            });
        }
        return Ok(());
    }

    let Some(pattern) = rule.matcher.pattern() else {
        return Ok(());
    };

    if pattern.pattern.trim().is_empty() {
        return Err(RuleError::EmptyPattern { index, mode });
    }

    if pattern.is_regex {
        RegexBuilder::new(&pattern.pattern)
            .case_insensitive(!pattern.case_sensitive)
            .build()
            .map_err(|e| RuleError::InvalidRegex {
                index,
                mode,
                pattern: pattern.pattern.clone(),
                message: e.to_string(),
            })?;
    }

    Ok(())
}

/// Validates every rule, collecting all errors.
pub fn validate_rules(rules: &[ActivationRule]) -> Result<(), Vec<RuleError>> {
    let errors: Vec<RuleError> = rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| validate_rule(index, rule).err())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
