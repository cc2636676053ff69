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

use std::sync::Arc;

use super::fixtures::{accel, registry};
use crate::hotkey::backend::UnsupportedBackend;
use crate::hotkey::conflict::{BindingId, BindingStatus, ConflictCode};
use crate::hotkey::registry::{HotkeyRegistry, HotkeyRequest};
use crate::hotkey::resolution::{ConflictResolution, ResolutionError, ResolutionState};

fn profile(id: &str) -> BindingId {
    BindingId::from(format!("profile:{}", id))
}

#[tokio::test]
async fn test_registers_without_conflicts() {
    let (_, registry) = registry();
    let mut resolution = ConflictResolution::new(registry, HotkeyRequest::new("profile:A", "Ctrl+Alt+Space"));

    assert_eq!(resolution.state(), &ResolutionState::Idle);
    assert_eq!(resolution.start().await.unwrap(), &ResolutionState::Registered);
    assert!(resolution.state().is_terminal());

    let again = resolution.start().await;
    assert!(matches!(again, Err(ResolutionError::InvalidTransition { action: "start", .. })));
}

#[tokio::test]
async fn test_disable_other_binding_then_retry() {
    let (backend, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+Alt+Space")).await;

    let mut resolution =
        ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+Alt+Space"));
    resolution.start().await.unwrap();

    let report = resolution.report().unwrap();
    assert_eq!(report.entries()[0].code, ConflictCode::DuplicateInternal);
    assert_eq!(report.entries()[0].conflicting_id, Some(profile("B")));
    assert!(resolution.can_override());
    assert_eq!(resolution.disable_targets(), vec![profile("B")]);

    let state = resolution.disable_and_retry(&profile("B")).await.unwrap();
    assert_eq!(state, &ResolutionState::Registered);

    assert_eq!(registry.status(&profile("B")), BindingStatus::Unregistered);
    assert_eq!(registry.status(&profile("A")), BindingStatus::Registered);
    assert_eq!(
        backend.fire(&accel("Ctrl+Alt+Space")).unwrap().payload.id,
        profile("A")
    );
}

#[tokio::test]
async fn test_reserved_conflict_disables_override() {
    let (_, registry) = registry();
    let mut resolution = ConflictResolution::new(
        registry,
        HotkeyRequest::new("profile:A", "Ctrl+Alt+Delete").allowing_conflicts(),
    );
    resolution.start().await.unwrap();

    assert!(matches!(resolution.state(), ResolutionState::AwaitingUserChoice(_)));
    assert!(!resolution.can_override());

    let err = resolution.retry_with_override().await.unwrap_err();
    assert_eq!(err, ResolutionError::OverrideBlocked(vec![ConflictCode::ReservedByPlatform]));
    assert!(matches!(resolution.state(), ResolutionState::AwaitingUserChoice(_)));
}

#[tokio::test]
async fn test_override_displaces_other_binding() {
    let (_, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+Alt+Space")).await;

    let mut resolution =
        ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+Alt+Space"));
    resolution.start().await.unwrap();

    let state = resolution.retry_with_override().await.unwrap();
    assert_eq!(state, &ResolutionState::Registered);
    assert_eq!(registry.status(&profile("B")), BindingStatus::Conflicted);
}

#[tokio::test]
async fn test_cancel_restores_prior_state() {
    let (_, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+K")).await;

    let mut resolution = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+K"));
    resolution.start().await.unwrap();
    assert_eq!(registry.status(&profile("A")), BindingStatus::Conflicted);

    assert_eq!(resolution.cancel().unwrap(), &ResolutionState::Cancelled);
    assert_eq!(registry.status(&profile("A")), BindingStatus::Unregistered);
    assert_eq!(registry.status(&profile("B")), BindingStatus::Registered);

    assert!(matches!(
        resolution.cancel(),
        Err(ResolutionError::InvalidTransition { state: "cancelled", .. })
    ));
}

#[tokio::test]
async fn test_cancel_leaves_edited_binding_unchanged() {
    let (backend, registry) = registry();
    registry.request(HotkeyRequest::new("profile:A", "Ctrl+J")).await;
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+K")).await;

    let mut resolution = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+K"));
    resolution.start().await.unwrap();
    resolution.cancel().unwrap();

    assert_eq!(registry.status(&profile("A")), BindingStatus::Registered);
    assert!(backend.is_held(&accel("Ctrl+J")));
}

#[tokio::test]
async fn test_newer_request_supersedes_open_dialog() {
    let (_, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+K")).await;

    let mut stale = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+K"));
    stale.start().await.unwrap();

    let mut fresh = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+L"));
    assert_eq!(fresh.start().await.unwrap(), &ResolutionState::Registered);

    let err = stale.retry_with_override().await.unwrap_err();
    assert_eq!(err, ResolutionError::Superseded);
    assert_eq!(stale.state(), &ResolutionState::Superseded);

    // The stale dialog did not take Ctrl+K away from B
    assert_eq!(registry.status(&profile("B")), BindingStatus::Registered);
}

#[tokio::test]
async fn test_disable_requires_named_conflict() {
    let (_, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+K")).await;

    let mut resolution = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+K"));
    resolution.start().await.unwrap();

    let err = resolution.disable_and_retry(&profile("C")).await.unwrap_err();
    assert_eq!(err, ResolutionError::NoInternalConflict(profile("C")));
    assert!(matches!(resolution.state(), ResolutionState::AwaitingUserChoice(_)));
}

#[tokio::test]
async fn test_retry_ends_failed_when_still_unavailable() {
    let (backend, registry) = registry();
    registry.request(HotkeyRequest::new("profile:B", "Ctrl+K")).await;

    let mut resolution = ConflictResolution::new(registry.clone(), HotkeyRequest::new("profile:A", "Ctrl+K"));
    resolution.start().await.unwrap();

    // Another application grabs the accelerator once B lets go
    backend.hold_externally(&accel("Ctrl+K"));
    let state = resolution.disable_and_retry(&profile("B")).await.unwrap();

    match state {
        ResolutionState::Failed(report) => assert!(report.has(ConflictCode::AlreadyRegistered)),
        other => panic!("expected failed, got {}", other),
    }
}

#[tokio::test]
async fn test_actions_before_start_are_rejected() {
    let (_, registry) = registry();
    let mut resolution = ConflictResolution::new(registry, HotkeyRequest::new("profile:A", "Ctrl+K"));

    assert!(matches!(
        resolution.retry_with_override().await,
        Err(ResolutionError::InvalidTransition { state: "idle", .. })
    ));
    assert!(resolution.cancel().is_err());
}

#[tokio::test]
async fn test_unsupported_environment() {
    let registry = Arc::new(HotkeyRegistry::new(Arc::new(UnsupportedBackend)));
    let mut resolution = ConflictResolution::new(registry, HotkeyRequest::new("profile:A", "Ctrl+K"));

    assert_eq!(resolution.start().await.unwrap(), &ResolutionState::Unsupported);
}
