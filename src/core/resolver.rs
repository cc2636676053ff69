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

//! Active profile selection
//!
//! Picks at most one profile for a context snapshot:
//! 1. A pinned profile wins outright if it is enabled and presentable
//! 2. Otherwise profiles with rules are scanned in declaration order and
//!    the first whose rules match is selected
//! 3. Otherwise the first enabled, presentable profile without rules is
//!    the fallback
//!
//! Disabled and structurally invalid profiles are never selected. The
//! function holds no state and is cheap enough to run on every context tick.

use serde::Serialize;

use crate::core::rules::evaluate;
use crate::core::types::{ContextSnapshot, ProfileId, ProfileRecord};
use crate::core::validator::is_presentable;

/// Why a profile was selected
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ActivationReason {
    /// Explicit user activation
    Pinned,
    /// Rule at `rule_index` matched
    Rule { rule_index: usize },
    /// No rule matched; first rule-less profile
    Fallback,
}

/// The selected profile and the reason for selecting it
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub profile_id: ProfileId,
    pub reason: ActivationReason,
}

/// Resolves the active profile id, or `None` for the empty state.
///
/// # Example
/// ```
/// use radial_profiles::core::resolver::resolve;
/// use radial_profiles::core::ContextSnapshot;
///
/// assert_eq!(resolve(&[], &ContextSnapshot::empty(), None), None);
/// ```
pub fn resolve(
    profiles: &[ProfileRecord],
    ctx: &ContextSnapshot,
    pinned: Option<ProfileId>,
) -> Option<ProfileId> {
    resolve_detailed(profiles, ctx, pinned).map(|resolution| resolution.profile_id)
}

/// Like [`resolve`], also reporting why the profile was chosen.
pub fn resolve_detailed(
    profiles: &[ProfileRecord],
    ctx: &ContextSnapshot,
    pinned: Option<ProfileId>,
) -> Option<Resolution> {
    if let Some(pinned_id) = pinned {
        let pinned_record = profiles
            .iter()
            .find(|record| record.id() == pinned_id)
            .filter(|record| is_candidate(record));

        if let Some(record) = pinned_record {
            return Some(Resolution {
                profile_id: record.id(),
                reason: ActivationReason::Pinned,
            });
        }
    }

    let mut fallback: Option<ProfileId> = None;

    for record in profiles.iter().filter(|record| is_candidate(record)) {
        let rules = &record.profile.activation_rules;

        if rules.is_empty() {
            fallback.get_or_insert(record.id());
            continue;
        }

        let result = evaluate(rules, ctx);
        if let (true, Some(rule_index)) = (result.matched, result.rule_index) {
            return Some(Resolution {
                profile_id: record.id(),
                reason: ActivationReason::Rule { rule_index },
            });
        }
    }

    fallback.map(|profile_id| Resolution {
        profile_id,
        reason: ActivationReason::Fallback,
    })
}

fn is_candidate(record: &ProfileRecord) -> bool {
    record.profile.enabled && is_presentable(record)
}
