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

//! src/hotkey/mod.rs
//!
//! Global hotkey lifecycle
//!
//! - [`conflict`]: binding ids, statuses, conflict codes and reports
//! - [`backend`]: the async seam to the OS shortcut API
//! - [`registry`]: the binding table and the request pipeline
//! - [`resolution`]: the per-request conflict resolution state machine

pub mod backend;
pub mod conflict;
pub mod registry;
pub mod resolution;

pub use backend::{
    BackendError, HotkeyEventPayload, HotkeyTrigger, MemoryBackend, ShortcutBackend, UnsupportedBackend,
    DEFAULT_TRIGGER_EVENT,
};
pub use conflict::{BindingId, BindingStatus, ConflictCode, ConflictEntry, ConflictReport, ReservedShortcuts};
pub use registry::{
    Binding, HotkeyRegistry, HotkeyRequest, RegistrationOutcome, RegistrationStatus, RequestToken,
};
pub use resolution::{ConflictResolution, ResolutionError, ResolutionState};

#[cfg(test)]
mod tests;
