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
use std::time::Duration;
use tempfile::TempDir;

use super::fixtures::{accel, profile, with_hotkey};
use crate::config::{EngineSettings, ProfileDocument, ProfileRepository};
use crate::engine::{Engine, EngineError};
use crate::hotkey::{BindingId, HotkeyRegistry, MemoryBackend, ReservedShortcuts};

fn persistent_engine(dir: &TempDir) -> (Arc<MemoryBackend>, Engine) {
    let backend = Arc::new(MemoryBackend::new());
    let registry = HotkeyRegistry::new(backend.clone()).with_reserved(ReservedShortcuts::none());
    let repository = ProfileRepository::new(dir.path().join("profiles.json")).unwrap();
    (backend, Engine::new(Arc::new(registry)).with_repository(repository))
}

#[tokio::test]
async fn test_saved_profiles_survive_restart() {
    let dir = TempDir::new().unwrap();
    let record = with_hotkey(profile("Editor"), "Ctrl+Alt+E");
    {
        let (_, engine) = persistent_engine(&dir);
        engine.save_profile(record.clone()).await.unwrap();
        engine.activate_profile(record.id()).await.unwrap();
    }

    let (backend, engine) = persistent_engine(&dir);
    assert_eq!(engine.load().await.unwrap(), 1);

    let listing = engine.list_profiles();
    assert_eq!(listing.profiles[0].profile.name, "Editor");
    assert_eq!(listing.active_profile_id, Some(record.id()));
    assert!(backend.is_held(&accel("Ctrl+Alt+E")));
}

#[tokio::test]
async fn test_reload_drops_bindings_of_removed_profiles() {
    let dir = TempDir::new().unwrap();
    let (backend, engine) = persistent_engine(&dir);
    let keep = with_hotkey(profile("Keep"), "Ctrl+Alt+1");
    let gone = with_hotkey(profile("Gone"), "Ctrl+Alt+2");
    engine.save_profile(keep.clone()).await.unwrap();
    engine.save_profile(gone.clone()).await.unwrap();

    // Edited outside the engine
    let repository = ProfileRepository::new(dir.path().join("profiles.json")).unwrap();
    let mut document = repository.load().unwrap();
    document.profiles.retain(|record| record.id() == keep.id());
    repository.save(&document).unwrap();

    engine.load().await.unwrap();

    assert!(backend.is_held(&accel("Ctrl+Alt+1")));
    assert!(!backend.is_held(&accel("Ctrl+Alt+2")));
    assert!(engine.registry().binding(&BindingId::for_profile(gone.id())).is_none());
}

#[tokio::test]
async fn test_failed_write_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be makes every write fail
    std::fs::create_dir(dir.path().join("profiles.json")).unwrap();
    let repository = ProfileRepository::new(dir.path().join("profiles.json"))
        .unwrap()
        .with_backups(false);
    let engine = Engine::new(Arc::new(HotkeyRegistry::new(Arc::new(MemoryBackend::new())))).with_repository(repository);

    let result = engine.save_profile(profile("Lost")).await;

    assert!(matches!(result, Err(EngineError::Config(_))));
    assert!(engine.list_profiles().profiles.is_empty());
}

#[tokio::test]
async fn test_reload_of_corrupt_file_keeps_state() {
    let dir = TempDir::new().unwrap();
    let (_, engine) = persistent_engine(&dir);
    engine.save_profile(profile("Kept")).await.unwrap();

    std::fs::write(dir.path().join("profiles.json"), "{ broken").unwrap();

    assert!(engine.load().await.is_err());
    assert_eq!(engine.list_profiles().profiles.len(), 1);
}

#[tokio::test]
async fn test_saved_file_is_schema_v2() {
    let dir = TempDir::new().unwrap();
    let (_, engine) = persistent_engine(&dir);
    engine.save_profile(profile("Default")).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("profiles.json")).unwrap();
    let document = ProfileDocument::from_json(&content).unwrap();
    assert_eq!(document.schema_version, 2);
    assert!(content.contains("\"schemaVersion\": 2"));
}

#[tokio::test]
async fn test_engine_from_settings() {
    let dir = TempDir::new().unwrap();
    let settings = EngineSettings {
        profiles_path: dir.path().join("nested/profiles.json").to_string_lossy().into_owned(),
        backups: false,
        reserved_accelerators: vec!["Ctrl+Alt+R".to_string()],
        ..EngineSettings::default()
    };
    let backend = Arc::new(MemoryBackend::new());
    let engine = Engine::from_settings(&settings, backend.clone()).unwrap();

    assert_eq!(engine.load().await.unwrap(), 0);
    let saved = engine
        .save_profile(with_hotkey(profile("Reserved"), "Ctrl+Alt+R"))
        .await
        .unwrap();

    assert!(!saved.hotkeys[0].status.registered);
    assert!(dir.path().join("nested/profiles.json").exists());
    assert!(!dir.path().join("nested/backups").exists());
}

#[tokio::test]
async fn test_started_engine_reloads_on_file_change() {
    let dir = TempDir::new().unwrap();
    let (backend, engine) = persistent_engine(&dir);
    let engine = Arc::new(engine.with_watch(true));
    let handle = engine.clone().start(8);

    let record = with_hotkey(profile("External"), "Ctrl+Alt+X");
    let external = ProfileRepository::new(dir.path().join("profiles.json")).unwrap();
    external.save(&ProfileDocument::new(vec![record.clone()], None)).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !engine.store().contains(record.id()) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert!(backend.is_held(&accel("Ctrl+Alt+X")));

    handle.shutdown().await.unwrap();
    assert!(!backend.is_held(&accel("Ctrl+Alt+X")));
}

#[tokio::test]
async fn test_engine_without_watch_ignores_file_changes() {
    let dir = TempDir::new().unwrap();
    let (_, engine) = persistent_engine(&dir);
    let engine = Arc::new(engine);
    let handle = engine.clone().start(8);

    let external = ProfileRepository::new(dir.path().join("profiles.json")).unwrap();
    external.save(&ProfileDocument::new(vec![profile("External")], None)).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(engine.store().is_empty());
    handle.shutdown().await.unwrap();
}
