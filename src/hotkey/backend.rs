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

//! OS shortcut API seam
//!
//! The registry talks to the platform only through [`ShortcutBackend`].
//! Every call may fail or hang, so the registry bounds each one with a
//! timeout and maps [`BackendError`] onto conflict codes.
//!
//! [`MemoryBackend`] is a complete in-process implementation used by tests
//! and by the CLI. It can simulate accelerators held by other applications,
//! platform denials, failing availability checks and slow registrations.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::core::Accelerator;
use crate::hotkey::conflict::{BindingId, ConflictCode, ConflictEntry};

/// Event emitted when no other name is requested.
pub const DEFAULT_TRIGGER_EVENT: &str = "hotkeys://trigger";

/// Payload delivered when a registered accelerator is pressed
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyEventPayload {
    pub id: BindingId,
    pub accelerator: String,
}

/// What the backend emits for a registered accelerator
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HotkeyTrigger {
    pub event: String,
    pub payload: HotkeyEventPayload,
}

/// Failures reported by the OS shortcut API
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    #[error("Accelerator '{0}' is held by another application")]
    AlreadyRegistered(String),

    #[error("Platform denied accelerator '{accelerator}': {reason}")]
    Denied { accelerator: String, reason: String },

    #[error("Shortcut API call failed: {0}")]
    Failed(String),

    #[error("Global shortcuts are not available in this environment")]
    Unavailable,

    #[error("Shortcut API call timed out after {0:?}")]
    TimedOut(Duration),
}

impl BackendError {
    /// Conflict entry for a failed registration attempt.
    pub fn registration_conflict(&self) -> ConflictEntry {
        let code = match self {
            BackendError::AlreadyRegistered(_) => ConflictCode::AlreadyRegistered,
            BackendError::Denied { .. } => ConflictCode::PlatformDenied,
            BackendError::Failed(_) | BackendError::Unavailable | BackendError::TimedOut(_) => {
                ConflictCode::RegistrationFailed
            }
        };
        ConflictEntry::new(code, self.to_string())
    }

    /// Conflict entry for a failed availability query.
    pub fn check_conflict(&self) -> ConflictEntry {
        ConflictEntry::new(ConflictCode::CheckFailed, format!("Availability check failed: {}", self))
    }
}

/// The external OS global-shortcut API
#[async_trait]
pub trait ShortcutBackend: Send + Sync {
    /// False when the integration layer is absent (e.g. a preview context).
    fn is_available(&self) -> bool;

    /// Whether the accelerator is currently held by anyone at OS level.
    async fn is_registered(&self, accelerator: &Accelerator) -> Result<bool, BackendError>;

    async fn register(&self, accelerator: &Accelerator, trigger: HotkeyTrigger) -> Result<(), BackendError>;

    async fn unregister(&self, accelerator: &Accelerator) -> Result<(), BackendError>;
}

/// Backend for environments without global shortcuts
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedBackend;

#[async_trait]
impl ShortcutBackend for UnsupportedBackend {
    fn is_available(&self) -> bool {
        false
    }

    async fn is_registered(&self, _accelerator: &Accelerator) -> Result<bool, BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn register(&self, _accelerator: &Accelerator, _trigger: HotkeyTrigger) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }

    async fn unregister(&self, _accelerator: &Accelerator) -> Result<(), BackendError> {
        Err(BackendError::Unavailable)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    registered: HashMap<Accelerator, HotkeyTrigger>,
    external: HashSet<Accelerator>,
    denied: HashSet<Accelerator>,
    failing_registrations: HashSet<Accelerator>,
    failing_checks: bool,
    register_delay: Option<Duration>,
    unregister_delay: Option<Duration>,
    register_calls: usize,
}

/// In-process shortcut table
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another application holding `accelerator`.
    pub fn hold_externally(&self, accelerator: &Accelerator) {
        self.state.lock().external.insert(accelerator.clone());
    }

    /// Registrations of `accelerator` are refused by the platform.
    pub fn deny(&self, accelerator: &Accelerator) {
        self.state.lock().denied.insert(accelerator.clone());
    }

    /// Registrations of `accelerator` fail with a generic error.
    pub fn fail_registration(&self, accelerator: &Accelerator) {
        self.state.lock().failing_registrations.insert(accelerator.clone());
    }

    pub fn fail_checks(&self, failing: bool) {
        self.state.lock().failing_checks = failing;
    }

    /// Every registration sleeps this long before completing.
    pub fn set_register_delay(&self, delay: Option<Duration>) {
        self.state.lock().register_delay = delay;
    }

    /// Every unregistration sleeps this long before taking effect.
    pub fn set_unregister_delay(&self, delay: Option<Duration>) {
        self.state.lock().unregister_delay = delay;
    }

    pub fn is_held(&self, accelerator: &Accelerator) -> bool {
        self.state.lock().registered.contains_key(accelerator)
    }

    pub fn held(&self) -> Vec<Accelerator> {
        self.state.lock().registered.keys().cloned().collect()
    }

    pub fn register_calls(&self) -> usize {
        self.state.lock().register_calls
    }

    /// Simulates a key press, returning what would be emitted.
    pub fn fire(&self, accelerator: &Accelerator) -> Option<HotkeyTrigger> {
        self.state.lock().registered.get(accelerator).cloned()
    }
}

#[async_trait]
impl ShortcutBackend for MemoryBackend {
    fn is_available(&self) -> bool {
        true
    }

    async fn is_registered(&self, accelerator: &Accelerator) -> Result<bool, BackendError> {
        let state = self.state.lock();
        if state.failing_checks {
            return Err(BackendError::Failed("query rejected".to_string()));
        }
        Ok(state.external.contains(accelerator) || state.registered.contains_key(accelerator))
    }

    async fn register(&self, accelerator: &Accelerator, trigger: HotkeyTrigger) -> Result<(), BackendError> {
        let delay = {
            let mut state = self.state.lock();
            state.register_calls += 1;
            state.register_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let name = accelerator.to_string();

        if state.denied.contains(accelerator) {
            return Err(BackendError::Denied {
                accelerator: name,
                reason: "reserved by system policy".to_string(),
            });
        }
        if state.failing_registrations.contains(accelerator) {
            return Err(BackendError::Failed(format!("could not register '{}'", name)));
        }
        if state.external.contains(accelerator) || state.registered.contains_key(accelerator) {
            return Err(BackendError::AlreadyRegistered(name));
        }

        state.registered.insert(accelerator.clone(), trigger);
        Ok(())
    }

    async fn unregister(&self, accelerator: &Accelerator) -> Result<(), BackendError> {
        let delay = self.state.lock().unregister_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.lock().registered.remove(accelerator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(id: &str, accelerator: &Accelerator) -> HotkeyTrigger {
        HotkeyTrigger {
            event: DEFAULT_TRIGGER_EVENT.to_string(),
            payload: HotkeyEventPayload {
                id: BindingId::from(id),
                accelerator: accelerator.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_memory_backend_register_and_fire() {
        let backend = MemoryBackend::new();
        let accelerator = Accelerator::parse("Ctrl+Alt+Space").unwrap();

        backend.register(&accelerator, trigger("profile:A", &accelerator)).await.unwrap();
        assert!(backend.is_registered(&accelerator).await.unwrap());

        let fired = backend.fire(&accelerator).unwrap();
        assert_eq!(fired.payload.id, BindingId::from("profile:A"));
        assert_eq!(fired.event, "hotkeys://trigger");

        backend.unregister(&accelerator).await.unwrap();
        assert!(backend.fire(&accelerator).is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_simulated_failures() {
        let backend = MemoryBackend::new();
        let held = Accelerator::parse("Ctrl+K").unwrap();
        let denied = Accelerator::parse("Ctrl+J").unwrap();

        backend.hold_externally(&held);
        backend.deny(&denied);

        let err = backend.register(&held, trigger("a", &held)).await.unwrap_err();
        assert_eq!(err.registration_conflict().code, ConflictCode::AlreadyRegistered);

        let err = backend.register(&denied, trigger("b", &denied)).await.unwrap_err();
        assert_eq!(err.registration_conflict().code, ConflictCode::PlatformDenied);

        backend.fail_checks(true);
        let err = backend.is_registered(&held).await.unwrap_err();
        assert_eq!(err.check_conflict().code, ConflictCode::CheckFailed);
    }

    #[tokio::test]
    async fn test_unsupported_backend() {
        let backend = UnsupportedBackend;
        assert!(!backend.is_available());
        let accelerator = Accelerator::parse("Ctrl+K").unwrap();
        assert_eq!(backend.unregister(&accelerator).await, Err(BackendError::Unavailable));
    }
}
