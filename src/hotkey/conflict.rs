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

//! Binding identities, statuses and conflict reports
//!
//! Conflicts are values, never errors. A [`ConflictReport`] is an ordered
//! list of [`ConflictEntry`] items; only `duplicateInternal` can be resolved
//! by the application itself, every other code is blocking.
//!
//! [`ReservedShortcuts`] holds the accelerators the operating system keeps
//! for itself. The local duplicate index lives in [`ConflictDetector`]: an
//! accelerator-keyed HashMap, so lookups stay O(1) however many bindings the
//! profiles define.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{Accelerator, AcceleratorError, PieSliceId, ProfileId};

/// Logical id of a binding, e.g. `profile:<uuid>` or `slice:<uuid>`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BindingId(String);

impl BindingId {
    pub const PROFILE_PREFIX: &'static str = "profile:";
    pub const SLICE_PREFIX: &'static str = "slice:";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Binding for a profile's global accelerator.
    pub fn for_profile(id: ProfileId) -> Self {
        Self(format!("{}{}", Self::PROFILE_PREFIX, id))
    }

    /// Binding for a slice's direct accelerator.
    pub fn for_slice(id: PieSliceId) -> Self {
        Self(format!("{}{}", Self::SLICE_PREFIX, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BindingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Registration state of a binding
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingStatus {
    Unregistered,
    Pending,
    Registered,
    Conflicted,
    Failed,
}

impl fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingStatus::Unregistered => "unregistered",
            BindingStatus::Pending => "pending",
            BindingStatus::Registered => "registered",
            BindingStatus::Conflicted => "conflicted",
            BindingStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why an accelerator could not be bound
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictCode {
    /// Another binding of this application holds the accelerator
    DuplicateInternal,
    ReservedByPlatform,
    InvalidAccelerator,
    /// Held by another application
    AlreadyRegistered,
    /// The availability query itself failed
    CheckFailed,
    RegistrationFailed,
    PlatformDenied,
}

impl ConflictCode {
    /// Everything except `duplicateInternal` needs a different accelerator.
    pub fn is_blocking(self) -> bool {
        self != ConflictCode::DuplicateInternal
    }

    /// Failures of the OS call rather than of the accelerator itself.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ConflictCode::CheckFailed | ConflictCode::RegistrationFailed | ConflictCode::PlatformDenied
        )
    }
}

impl fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictCode::DuplicateInternal => "duplicateInternal",
            ConflictCode::ReservedByPlatform => "reservedByPlatform",
            ConflictCode::InvalidAccelerator => "invalidAccelerator",
            ConflictCode::AlreadyRegistered => "alreadyRegistered",
            ConflictCode::CheckFailed => "checkFailed",
            ConflictCode::RegistrationFailed => "registrationFailed",
            ConflictCode::PlatformDenied => "platformDenied",
        };
        f.write_str(name)
    }
}

/// One conflict with a human-readable message
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub code: ConflictCode,
    pub message: String,
    /// Internal binding holding the accelerator (`duplicateInternal` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicting_id: Option<BindingId>,
}

impl ConflictEntry {
    pub fn new(code: ConflictCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            conflicting_id: None,
        }
    }

    pub fn duplicate_internal(accelerator: &Accelerator, holder: BindingId) -> Self {
        Self {
            code: ConflictCode::DuplicateInternal,
            message: format!("Accelerator '{}' is already bound to '{}'", accelerator, holder),
            conflicting_id: Some(holder),
        }
    }

    pub fn reserved(accelerator: &Accelerator) -> Self {
        Self::new(
            ConflictCode::ReservedByPlatform,
            format!("Accelerator '{}' is reserved by the operating system", accelerator),
        )
    }

    pub fn invalid(error: &AcceleratorError) -> Self {
        Self::new(ConflictCode::InvalidAccelerator, format!("Invalid accelerator: {}", error))
    }
}

/// Ordered list of conflicts for one request
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConflictReport(Vec<ConflictEntry>);

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(entry: ConflictEntry) -> Self {
        Self(vec![entry])
    }

    pub fn push(&mut self, entry: ConflictEntry) {
        self.0.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<ConflictEntry> {
        self.0
    }

    pub fn has(&self, code: ConflictCode) -> bool {
        self.0.iter().any(|entry| entry.code == code)
    }

    /// True if any entry needs a different accelerator.
    pub fn is_blocking(&self) -> bool {
        self.0.iter().any(|entry| entry.code.is_blocking())
    }

    /// Codes of the blocking entries, in report order.
    pub fn blocking_codes(&self) -> Vec<ConflictCode> {
        self.0
            .iter()
            .map(|entry| entry.code)
            .filter(|code| code.is_blocking())
            .collect()
    }

    /// Internal bindings named by `duplicateInternal` entries.
    pub fn duplicate_internal_ids(&self) -> Vec<&BindingId> {
        self.0
            .iter()
            .filter(|entry| entry.code == ConflictCode::DuplicateInternal)
            .filter_map(|entry| entry.conflicting_id.as_ref())
            .collect()
    }
}

impl From<Vec<ConflictEntry>> for ConflictReport {
    fn from(entries: Vec<ConflictEntry>) -> Self {
        Self(entries)
    }
}

#[cfg(target_os = "windows")]
const PLATFORM_RESERVED: &[&str] = &["Alt+Tab", "Ctrl+Alt+Delete", "Alt+F4", "Win+L", "Win+D"];
#[cfg(target_os = "macos")]
const PLATFORM_RESERVED: &[&str] = &["Cmd+Tab", "Cmd+Option+Escape", "Ctrl+Cmd+Q"];
#[cfg(target_os = "linux")]
const PLATFORM_RESERVED: &[&str] = &["Ctrl+Alt+F1", "Ctrl+Alt+F2", "Ctrl+Alt+F3", "Ctrl+Alt+F4"];
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
const PLATFORM_RESERVED: &[&str] = &[];

/// Accelerators the operating system keeps for itself
#[derive(Clone, Debug, Default)]
pub struct ReservedShortcuts {
    accelerators: HashSet<Accelerator>,
}

impl ReservedShortcuts {
    /// No reserved accelerators at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// The built-in list for the current platform.
    pub fn platform() -> Self {
        let mut reserved = Self::none();
        for error in reserved.extend(PLATFORM_RESERVED.iter().copied()) {
            warn!(error = %error, "Skipping unparsable built-in reserved shortcut");
        }
        reserved
    }

    /// Adds accelerators, skipping and returning those that fail to parse.
    pub fn extend<I, S>(&mut self, accelerators: I) -> Vec<AcceleratorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut errors = Vec::new();
        for raw in accelerators {
            match Accelerator::parse(raw.as_ref()) {
                Ok(accelerator) => {
                    self.accelerators.insert(accelerator);
                }
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    pub fn contains(&self, accelerator: &Accelerator) -> bool {
        self.accelerators.contains(accelerator)
    }

    pub fn len(&self) -> usize {
        self.accelerators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accelerators.is_empty()
    }
}

/// Maps each held accelerator to the internal binding holding it.
///
/// Time complexity: O(1) average case per lookup.
#[derive(Debug, Default)]
pub struct ConflictDetector {
    holders: HashMap<Accelerator, BindingId>,
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` as holder of `accelerator`, returning the previous holder.
    pub fn hold(&mut self, accelerator: Accelerator, id: BindingId) -> Option<BindingId> {
        self.holders.insert(accelerator, id)
    }

    /// Releases `accelerator` if `id` holds it.
    pub fn release(&mut self, accelerator: &Accelerator, id: &BindingId) {
        if self.holders.get(accelerator) == Some(id) {
            self.holders.remove(accelerator);
        }
    }

    /// The binding other than `requester` holding `accelerator`.
    pub fn holder_other_than(&self, accelerator: &Accelerator, requester: &BindingId) -> Option<&BindingId> {
        self.holders.get(accelerator).filter(|holder| *holder != requester)
    }

    pub fn holder(&self, accelerator: &Accelerator) -> Option<&BindingId> {
        self.holders.get(accelerator)
    }

    pub fn total_held(&self) -> usize {
        self.holders.len()
    }
}
