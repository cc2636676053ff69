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

//! Messages flowing into and out of the engine

use serde::Serialize;

use crate::core::{ActivationReason, ContextSnapshot, ProfileId};

/// Work items for the engine's event loop
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// The foreground window changed
    ContextChanged(ContextSnapshot),
    /// Pin a profile, or clear the pin with `None`
    Pin(Option<ProfileId>),
    /// The profiles file was modified on disk
    ProfilesFileChanged,
    Shutdown,
}

/// Store mutations, delivered to subscribers in commit order
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreEvent {
    Upserted { profile_id: ProfileId },
    Removed { profile_id: ProfileId },
    PinChanged { profile_id: Option<ProfileId> },
    /// Everything was replaced, e.g. after a reload
    Replaced,
}

/// The profile currently surfaced to the user
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProfile {
    pub profile_id: ProfileId,
    pub name: String,
    pub reason: ActivationReason,
}
