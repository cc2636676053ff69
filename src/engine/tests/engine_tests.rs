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

use std::time::Duration;
use tokio::sync::mpsc;

use super::fixtures::{accel, engine, for_process, profile, with_hotkey};
use crate::core::{ActionId, ActivationReason, ContextSnapshot, PieMenu, PieSlice, ProfileId, SliceTarget};
use crate::engine::{EngineError, EngineEvent, StoreEvent};
use crate::hotkey::{BindingId, BindingStatus, ConflictCode, HotkeyRequest};

#[tokio::test]
async fn test_save_and_list() {
    let (_, engine) = engine();
    let record = profile("Default");

    let saved = engine.save_profile(record.clone()).await.unwrap();
    assert!(saved.record.created_at.is_some());
    assert!(saved.hotkeys.is_empty());

    let listing = engine.list_profiles();
    assert_eq!(listing.profiles.len(), 1);
    assert_eq!(listing.profiles[0].id(), record.id());
    assert_eq!(listing.active_profile_id, None);
    assert_eq!(listing.resolved.unwrap().reason, ActivationReason::Fallback);
}

#[tokio::test]
async fn test_invalid_profile_is_rejected() {
    let (_, engine) = engine();
    let mut record = profile("");
    record.menus[0].slices.truncate(1);

    match engine.save_profile(record).await {
        Err(EngineError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(engine.list_profiles().profiles.is_empty());
}

#[tokio::test]
async fn test_save_registers_profile_and_slice_hotkeys() {
    let (backend, engine) = engine();
    let mut record = with_hotkey(profile("Editor"), "Ctrl+Alt+Space");
    record.menus[0].slices[0].hotkey = Some("Ctrl+Alt+C".to_string());
    let slice_id = record.menus[0].slices[0].id;

    let saved = engine.save_profile(record.clone()).await.unwrap();

    assert_eq!(saved.hotkeys.len(), 2);
    assert_eq!(saved.unregistered().count(), 0);
    assert!(backend.is_held(&accel("Ctrl+Alt+Space")));
    assert_eq!(
        engine.registry().status(&BindingId::for_slice(slice_id)),
        BindingStatus::Registered
    );
}

#[tokio::test]
async fn test_changing_hotkey_releases_previous() {
    let (backend, engine) = engine();
    let record = with_hotkey(profile("Editor"), "Ctrl+Alt+Space");
    engine.save_profile(record.clone()).await.unwrap();

    engine.save_profile(with_hotkey(record, "Ctrl+Alt+K")).await.unwrap();

    assert!(!backend.is_held(&accel("Ctrl+Alt+Space")));
    assert!(backend.is_held(&accel("Ctrl+Alt+K")));
}

#[tokio::test]
async fn test_removed_slice_hotkey_is_unregistered() {
    let (backend, engine) = engine();
    let mut record = profile("Editor");
    record.menus[0].slices[1].hotkey = Some("Ctrl+Alt+V".to_string());
    let slice_id = record.menus[0].slices[1].id;
    engine.save_profile(record.clone()).await.unwrap();

    record.menus[0].slices[1] = PieSlice::action("Paste plain", ActionId::new(), 1);
    engine.save_profile(record).await.unwrap();

    assert!(!backend.is_held(&accel("Ctrl+Alt+V")));
    assert!(engine.registry().binding(&BindingId::for_slice(slice_id)).is_none());
}

#[tokio::test]
async fn test_disabled_profile_releases_hotkeys() {
    let (backend, engine) = engine();
    let mut record = with_hotkey(profile("Editor"), "Ctrl+Alt+Space");
    engine.save_profile(record.clone()).await.unwrap();

    record.profile.enabled = false;
    let saved = engine.save_profile(record).await.unwrap();

    assert!(saved.hotkeys.is_empty());
    assert!(!backend.is_held(&accel("Ctrl+Alt+Space")));
    assert_eq!(engine.active(), None);
}

#[tokio::test]
async fn test_second_profile_reports_duplicate_hotkey() {
    let (_, engine) = engine();
    let a = with_hotkey(profile("A"), "Ctrl+Alt+Space");
    let b = with_hotkey(profile("B"), "alt + control + space");
    engine.save_profile(a.clone()).await.unwrap();

    let saved = engine.save_profile(b.clone()).await.unwrap();

    let sync = &saved.hotkeys[0];
    assert!(!sync.status.registered);
    assert_eq!(sync.status.conflicts[0].code, ConflictCode::DuplicateInternal);
    assert_eq!(sync.status.conflicts[0].conflicting_id, Some(BindingId::for_profile(a.id())));
    assert_eq!(engine.list_profiles().profiles.len(), 2, "conflicts do not block saving");
}

#[tokio::test]
async fn test_delete_unregisters_owned_bindings_only() {
    let (backend, engine) = engine();
    let mut record = with_hotkey(profile("Editor"), "Ctrl+Alt+Space");
    record.menus[0].slices[0].hotkey = Some("Ctrl+Alt+C".to_string());
    engine.save_profile(record.clone()).await.unwrap();
    engine.register_hotkey(HotkeyRequest::new("app:palette", "Ctrl+Shift+P")).await;

    engine.delete_profile(record.id()).await.unwrap();

    assert!(!backend.is_held(&accel("Ctrl+Alt+Space")));
    assert!(!backend.is_held(&accel("Ctrl+Alt+C")));
    let remaining: Vec<String> = engine.hotkeys().into_iter().map(|b| b.id.to_string()).collect();
    assert_eq!(remaining, vec!["app:palette"]);
}

#[tokio::test]
async fn test_unknown_profile_operations_fail() {
    let (_, engine) = engine();
    let missing = ProfileId::new();

    assert!(matches!(engine.delete_profile(missing).await, Err(EngineError::ProfileNotFound(id)) if id == missing));
    assert!(matches!(engine.activate_profile(missing).await, Err(EngineError::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_pin_overrides_rules_until_cleared() {
    let (_, engine) = engine();
    let browser = for_process("Browser", "chrome.exe");
    let editor = for_process("Editor", "code.exe");
    engine.save_profile(browser.clone()).await.unwrap();
    engine.save_profile(editor.clone()).await.unwrap();
    engine.update_context(ContextSnapshot::empty().with_process("chrome.exe"));

    engine.activate_profile(editor.id()).await.unwrap();
    let active = engine.active().unwrap();
    assert_eq!(active.profile_id, editor.id());
    assert_eq!(active.reason, ActivationReason::Pinned);
    assert_eq!(engine.list_profiles().active_profile_id, Some(editor.id()));

    engine.clear_pin().await.unwrap();
    assert_eq!(engine.active().unwrap().profile_id, browser.id());
}

#[tokio::test]
async fn test_deleting_pinned_profile_clears_pin() {
    let (_, engine) = engine();
    let record = profile("Pinned");
    engine.save_profile(record.clone()).await.unwrap();
    engine.activate_profile(record.id()).await.unwrap();

    engine.delete_profile(record.id()).await.unwrap();

    assert_eq!(engine.list_profiles().active_profile_id, None);
    assert_eq!(engine.active(), None);
}

#[tokio::test]
async fn test_context_changes_drive_resolution() {
    let (_, engine) = engine();
    let p1 = for_process("P1", "chrome.exe");
    let p2 = profile("P2");
    engine.save_profile(p1.clone()).await.unwrap();
    engine.save_profile(p2.clone()).await.unwrap();
    let mut active_rx = engine.subscribe_active();

    let active = engine.update_context(ContextSnapshot::empty().with_process("chrome.exe")).unwrap();
    assert_eq!(active.profile_id, p1.id());
    assert_eq!(active.reason, ActivationReason::Rule { rule_index: 0 });
    assert!(active_rx.has_changed().unwrap());
    active_rx.borrow_and_update();

    let active = engine.update_context(ContextSnapshot::empty().with_process("notepad.exe")).unwrap();
    assert_eq!(active.profile_id, p2.id());
    assert_eq!(active.reason, ActivationReason::Fallback);
}

#[tokio::test]
async fn test_same_window_does_not_notify() {
    let (_, engine) = engine();
    engine.save_profile(for_process("P1", "chrome.exe")).await.unwrap();
    engine.update_context(ContextSnapshot::empty().with_process("chrome.exe"));

    let mut active_rx = engine.subscribe_active();
    active_rx.borrow_and_update();

    let mut tick = ContextSnapshot::empty().with_process("chrome.exe");
    tick.captured_at_ms = 99;
    engine.update_context(tick);

    assert!(!active_rx.has_changed().unwrap());
    assert_eq!(engine.context().captured_at_ms, 99);
}

#[tokio::test]
async fn test_active_menu_orders_slices_and_resolves_targets() {
    let (_, engine) = engine();
    let child = {
        let mut menu = PieMenu::new("More");
        menu.slices.push(PieSlice::action("Undo", ActionId::new(), 0));
        menu.slices.push(PieSlice::action("Redo", ActionId::new(), 1));
        menu
    };
    let mut record = profile("Editor");
    let both = {
        let mut slice = PieSlice::action("More", ActionId::new(), 2);
        slice.child_menu = Some(child.id);
        slice
    };
    record.menus[0].slices.insert(0, both);
    record.menus.push(child.clone());
    engine.save_profile(record.clone()).await.unwrap();

    let menu = engine.active_menu().unwrap();

    let labels: Vec<&str> = menu.slices.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["Copy", "Paste", "More"]);
    assert_eq!(menu.slices[2].target, SliceTarget::Submenu(child.id));
    assert_eq!(menu.menu_id, record.profile.root_menu);
}

#[tokio::test]
async fn test_store_events_reach_subscribers() {
    let (_, engine) = engine();
    let mut rx = engine.subscribe_store();
    let record = profile("Default");

    engine.save_profile(record.clone()).await.unwrap();
    engine.activate_profile(record.id()).await.unwrap();

    assert_eq!(rx.try_recv().unwrap(), StoreEvent::Upserted { profile_id: record.id() });
    assert_eq!(rx.try_recv().unwrap(), StoreEvent::PinChanged { profile_id: Some(record.id()) });
}

#[tokio::test]
async fn test_hotkeys_disabled() {
    let backend = std::sync::Arc::new(crate::hotkey::MemoryBackend::new());
    let registry = crate::hotkey::HotkeyRegistry::new(backend.clone());
    let engine = crate::engine::Engine::new(std::sync::Arc::new(registry)).with_hotkeys(false);

    let saved = engine.save_profile(with_hotkey(profile("Quiet"), "Ctrl+Alt+Q")).await.unwrap();
    let status = engine.register_hotkey(HotkeyRequest::new("app:x", "Ctrl+Alt+X")).await;

    assert!(saved.hotkeys.is_empty());
    assert!(status.unsupported);
    assert!(backend.held().is_empty());
}

#[tokio::test]
async fn test_check_hotkey_reports_without_registering() {
    let (backend, engine) = engine();
    let record = with_hotkey(profile("A"), "Ctrl+Alt+Space");
    engine.save_profile(record.clone()).await.unwrap();

    let report = engine.check_hotkey("Ctrl+Alt+Space", None).await.unwrap();
    assert!(report.has(ConflictCode::DuplicateInternal));

    let own = engine
        .check_hotkey("Ctrl+Alt+Space", Some(&BindingId::for_profile(record.id())))
        .await
        .unwrap();
    assert!(own.is_empty());
    assert_eq!(backend.register_calls(), 1);
}

#[tokio::test]
async fn test_event_loop_processes_until_shutdown() {
    let (backend, engine) = engine();
    let browser = with_hotkey(for_process("Browser", "chrome.exe"), "Ctrl+Alt+B");
    let fallback = profile("Fallback");
    engine.save_profile(browser.clone()).await.unwrap();
    engine.save_profile(fallback.clone()).await.unwrap();

    let (tx, rx) = mpsc::channel(8);
    let mut active_rx = engine.subscribe_active();
    let handle = tokio::spawn(engine.clone().run(rx));

    tx.send(EngineEvent::ContextChanged(ContextSnapshot::empty().with_process("chrome.exe")))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), active_rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engine.active().unwrap().profile_id, browser.id());

    tx.send(EngineEvent::Pin(Some(fallback.id()))).await.unwrap();
    tx.send(EngineEvent::Shutdown).await.unwrap();
    handle.await.unwrap();

    assert_eq!(engine.active().unwrap().profile_id, fallback.id());
    assert!(!backend.is_held(&accel("Ctrl+Alt+B")), "shutdown releases profile hotkeys");
}
