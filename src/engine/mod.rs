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

//! src/engine/mod.rs
//!
//! Engine facade coordinating the store, the resolver and the hotkey registry
//!
//! The engine exposes the boundary operations collaborators call:
//! - `list_profiles`, `save_profile`, `delete_profile`, `activate_profile`
//! - `register_hotkey`, `unregister_hotkey`
//!
//! [`Engine::start`] runs the event loop on its own task and, when enabled,
//! reloads the store whenever the profiles file changes on disk.
//!
//! Each mutation returns a typed outcome. After a mutation is applied the
//! engine re-runs resolution and re-syncs the affected hotkeys before the
//! call returns, so callers never wait on a later refresh.

pub mod events;
pub mod store;

pub use events::{ActiveProfile, EngineEvent, StoreEvent};
pub use store::ProfileStore;

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineSettings, ProfileDocument, ProfileRepository};
use crate::core::{
    resolve_detailed, validate_record, ContextSnapshot, PieMenuId, PieSliceId, ProfileId, ProfileRecord,
    SliceTarget, ValidationError,
};
use crate::hotkey::{
    BackendError, Binding, BindingId, ConflictReport, HotkeyRegistry, HotkeyRequest, RegistrationStatus,
    ShortcutBackend,
};
use crate::watcher::ProfilesWatcher;

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Profile is invalid: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Profile {0} not found")]
    ProfileNotFound(ProfileId),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Result of `list_profiles`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileListing {
    pub profiles: Vec<ProfileRecord>,
    /// The manual pin
    pub active_profile_id: Option<ProfileId>,
    /// What resolution currently selects
    pub resolved: Option<ActiveProfile>,
}

/// Registration outcome for one binding owned by a saved profile
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeySync {
    pub id: BindingId,
    pub accelerator: String,
    #[serde(flatten)]
    pub status: RegistrationStatus,
}

/// Result of `save_profile`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProfile {
    pub record: ProfileRecord,
    pub hotkeys: Vec<HotkeySync>,
}

impl SavedProfile {
    /// Bindings that did not end up registered.
    pub fn unregistered(&self) -> impl Iterator<Item = &HotkeySync> {
        self.hotkeys.iter().filter(|sync| !sync.status.registered)
    }
}

/// One slice of the active menu, in ring order
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSlice {
    pub id: PieSliceId,
    pub label: String,
    pub hotkey: Option<String>,
    pub target: SliceTarget,
}

/// The active profile's root menu
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMenu {
    pub profile_id: ProfileId,
    pub menu_id: PieMenuId,
    pub title: String,
    pub slices: Vec<MenuSlice>,
}

/// Owns the profile store, the binding table, the current context and the
/// active profile.
///
/// Share it as `Arc<Engine>`; every operation takes `&self`.
pub struct Engine {
    store: ProfileStore,
    registry: Arc<HotkeyRegistry>,
    repository: Option<Arc<ProfileRepository>>,
    hotkeys_enabled: bool,
    watch_profiles: bool,
    context: Mutex<ContextSnapshot>,
    active: watch::Sender<Option<ActiveProfile>>,
    /// Serialises persist-then-apply sequences
    writes: tokio::sync::Mutex<()>,
}

/// A running engine task and its event queue
pub struct EngineHandle {
    events: mpsc::Sender<EngineEvent>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn sender(&self) -> mpsc::Sender<EngineEvent> {
        self.events.clone()
    }

    /// Queues an event. Returns false once the loop has stopped.
    pub async fn send(&self, event: EngineEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Stops the loop and waits for it to release its bindings.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        if !self.send(EngineEvent::Shutdown).await {
            debug!("Engine loop already stopped");
        }
        self.task.await.map_err(|e| EngineError::Task(e.to_string()))
    }
}

impl Engine {
    /// Creates an in-memory engine with no persistence.
    pub fn new(registry: Arc<HotkeyRegistry>) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            store: ProfileStore::new(),
            registry,
            repository: None,
            hotkeys_enabled: true,
            watch_profiles: false,
            context: Mutex::new(ContextSnapshot::empty()),
            active,
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds an engine from settings. Call [`Engine::load`] afterwards.
    ///
    /// # Errors
    ///
    /// * `EngineError::Config` - The profiles path cannot be expanded
    pub fn from_settings(settings: &EngineSettings, backend: Arc<dyn ShortcutBackend>) -> Result<Self, EngineError> {
        let registry = HotkeyRegistry::new(backend)
            .with_reserved(settings.reserved_shortcuts())
            .with_timeout(settings.backend_timeout());
        let repository = ProfileRepository::new(settings.profiles_path()?)?.with_backups(settings.backups);

        Ok(Self::new(Arc::new(registry))
            .with_repository(repository)
            .with_hotkeys(settings.hotkeys_enabled)
            .with_watch(settings.watch_profiles))
    }

    pub fn with_repository(mut self, repository: ProfileRepository) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// When disabled, profile hotkeys are never registered.
    pub fn with_hotkeys(mut self, enabled: bool) -> Self {
        self.hotkeys_enabled = enabled;
        self
    }

    /// When enabled, [`Engine::start`] watches the profiles file.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_profiles = enabled;
        self
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<HotkeyRegistry> {
        &self.registry
    }

    /// (Re)loads the profiles file, replacing the store.
    ///
    /// Bindings of profiles that disappeared are unregistered and every
    /// remaining profile hotkey is re-requested.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of profiles loaded
    /// * `Err(EngineError)` - Failed to read or parse the file
    pub async fn load(&self) -> Result<usize, EngineError> {
        let Some(repository) = self.repository.clone() else {
            return Ok(self.store.len());
        };

        let _write = self.writes.lock().await;
        let document = tokio::task::spawn_blocking(move || repository.load())
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;

        let count = document.profiles.len();
        self.store.replace_all(document);
        self.sync_all_hotkeys().await;
        self.reresolve();

        info!(profiles = count, "Profiles loaded");
        Ok(count)
    }

    pub fn list_profiles(&self) -> ProfileListing {
        ProfileListing {
            profiles: self.store.snapshot().as_ref().clone(),
            active_profile_id: self.store.pinned(),
            resolved: self.active(),
        }
    }

    /// Validates, persists and applies a profile record.
    ///
    /// # Errors
    ///
    /// * `EngineError::Validation` - Every problem that blocks saving
    /// * `EngineError::Config` - The document could not be written; the
    ///   store is left unchanged
    pub async fn save_profile(&self, record: ProfileRecord) -> Result<SavedProfile, EngineError> {
        validate_record(&record).map_err(EngineError::Validation)?;

        let _write = self.writes.lock().await;
        let previous = self.store.get(record.id());
        let record = self.store.stamp(record);

        let document = self
            .store
            .document_with(|profiles, _| store::upsert_into(profiles, record.clone()));
        self.persist(document).await?;

        self.store.upsert(record.clone());
        let hotkeys = self.sync_profile_hotkeys(&record, previous.as_ref()).await;
        self.reresolve();

        info!(profile = %record.id(), name = %record.profile.name, "Profile saved");
        Ok(SavedProfile { record, hotkeys })
    }

    /// Removes a profile and unregisters every binding it owned.
    pub async fn delete_profile(&self, id: ProfileId) -> Result<(), EngineError> {
        let _write = self.writes.lock().await;
        let record = self.store.get(id).ok_or(EngineError::ProfileNotFound(id))?;

        let document = self
            .store
            .document_with(|profiles, pinned| store::remove_from(profiles, pinned, id));
        self.persist(document).await?;

        self.store.remove(id);
        let owned = owned_bindings(&record);
        let removed = self.registry.unregister_matching(|binding| owned.contains(binding)).await;
        self.reresolve();

        info!(profile = %id, bindings = removed.len(), "Profile deleted");
        Ok(())
    }

    /// Pins a profile; it wins resolution while enabled and valid.
    pub async fn activate_profile(&self, id: ProfileId) -> Result<(), EngineError> {
        let _write = self.writes.lock().await;
        if !self.store.contains(id) {
            return Err(EngineError::ProfileNotFound(id));
        }
        self.set_pin(Some(id)).await
    }

    pub async fn clear_pin(&self) -> Result<(), EngineError> {
        let _write = self.writes.lock().await;
        self.set_pin(None).await
    }

    async fn set_pin(&self, pin: Option<ProfileId>) -> Result<(), EngineError> {
        if self.store.pinned() == pin {
            return Ok(());
        }

        let document = self.store.document_with(|_, pinned| *pinned = pin);
        self.persist(document).await?;

        self.store.set_pin(pin);
        self.reresolve();
        debug!(pin = ?pin, "Pin changed");
        Ok(())
    }

    /// Registers an arbitrary binding at the boundary.
    pub async fn register_hotkey(&self, request: HotkeyRequest) -> RegistrationStatus {
        if !self.hotkeys_enabled {
            return RegistrationStatus {
                unsupported: true,
                ..RegistrationStatus::default()
            };
        }
        self.registry.request(request).await.into()
    }

    /// Idempotent; unknown ids are ignored.
    pub async fn unregister_hotkey(&self, id: &BindingId) {
        self.registry.unregister(id).await;
    }

    pub fn hotkeys(&self) -> Vec<Binding> {
        self.registry.bindings()
    }

    pub async fn check_hotkey(&self, accelerator: &str, ignore: Option<&BindingId>) -> Result<ConflictReport, BackendError> {
        self.registry.check(accelerator, ignore).await
    }

    /// Feeds a new context snapshot and returns the active profile.
    ///
    /// A snapshot describing the same window as the current one only
    /// refreshes the stored timestamp.
    pub fn update_context(&self, context: ContextSnapshot) -> Option<ActiveProfile> {
        let changed = {
            let mut current = self.context.lock();
            let changed = !current.same_window(&context);
            *current = context;
            changed
        };

        if changed {
            self.reresolve();
        }
        self.active()
    }

    pub fn context(&self) -> ContextSnapshot {
        self.context.lock().clone()
    }

    pub fn active(&self) -> Option<ActiveProfile> {
        self.active.borrow().clone()
    }

    /// Receives every change of the active profile.
    pub fn subscribe_active(&self) -> watch::Receiver<Option<ActiveProfile>> {
        self.active.subscribe()
    }

    pub fn subscribe_store(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Root menu of the active profile, slices in ring order.
    pub fn active_menu(&self) -> Option<ActiveMenu> {
        let active = self.active()?;
        let record = self.store.get(active.profile_id)?;
        let menu = record.root_menu()?;

        let slices = menu
            .ordered_slices()
            .into_iter()
            .map(|slice| MenuSlice {
                id: slice.id,
                label: slice.label.clone(),
                hotkey: slice.hotkey.clone(),
                target: slice.target(),
            })
            .collect();

        Some(ActiveMenu {
            profile_id: record.id(),
            menu_id: menu.id,
            title: menu.title.clone(),
            slices,
        })
    }

    /// Spawns [`Engine::run`] with a queue of `capacity` events.
    ///
    /// The profiles watcher, if enabled, lives as long as the loop. A watcher
    /// that cannot start is logged and the engine runs without it.
    pub fn start(self: Arc<Self>, capacity: usize) -> EngineHandle {
        let (events, rx) = mpsc::channel(capacity);
        let watcher = self.watch_profiles(events.clone());

        let task = tokio::spawn(async move {
            let _watcher = watcher;
            self.run(rx).await;
        });

        EngineHandle { events, task }
    }

    fn watch_profiles(&self, events: mpsc::Sender<EngineEvent>) -> Option<ProfilesWatcher> {
        if !self.watch_profiles {
            return None;
        }
        let repository = self.repository.as_ref()?;

        match ProfilesWatcher::new(repository.path().to_path_buf(), events) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(path = %repository.path().display(), error = %e, "Cannot watch profiles file");
                None
            }
        }
    }

    /// Drives the engine from an event queue until `Shutdown` or until every
    /// sender is dropped.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<EngineEvent>) {
        info!("Engine started");

        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::ContextChanged(context) => {
                    self.update_context(context);
                }
                EngineEvent::Pin(Some(id)) => {
                    if let Err(e) = self.activate_profile(id).await {
                        warn!(profile = %id, error = %e, "Failed to pin profile");
                    }
                }
                EngineEvent::Pin(None) => {
                    if let Err(e) = self.clear_pin().await {
                        warn!(error = %e, "Failed to clear pin");
                    }
                }
                EngineEvent::ProfilesFileChanged => {
                    if let Err(e) = self.load().await {
                        warn!(error = %e, "Failed to reload profiles, keeping previous state");
                    }
                }
                EngineEvent::Shutdown => break,
            }
        }

        self.shutdown().await;
    }

    /// Releases every profile and slice binding.
    pub async fn shutdown(&self) {
        let released = self.registry.unregister_matching(is_profile_owned).await;
        info!(bindings = released.len(), "Engine stopped");
    }

    fn reresolve(&self) {
        let profiles = self.store.snapshot();
        let pinned = self.store.pinned();
        let context = self.context.lock().clone();

        let next = resolve_detailed(&profiles, &context, pinned).and_then(|resolution| {
            profiles
                .iter()
                .find(|record| record.id() == resolution.profile_id)
                .map(|record| ActiveProfile {
                    profile_id: resolution.profile_id,
                    name: record.profile.name.clone(),
                    reason: resolution.reason,
                })
        });

        self.active.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            match &next {
                Some(active) => info!(profile = %active.profile_id, name = %active.name, reason = ?active.reason, "Active profile changed"),
                None => info!("No active profile"),
            }
            *current = next;
            true
        });
    }

    async fn persist(&self, document: ProfileDocument) -> Result<(), EngineError> {
        let Some(repository) = self.repository.clone() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || repository.save(&document))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;
        Ok(())
    }

    /// Unregisters bindings the record no longer declares, then requests the
    /// ones it does.
    async fn sync_profile_hotkeys(&self, record: &ProfileRecord, previous: Option<&ProfileRecord>) -> Vec<HotkeySync> {
        let desired = profile_hotkeys(record);
        let wanted: HashSet<&BindingId> = desired.iter().map(|(id, _)| id).collect();

        let mut stale: HashSet<BindingId> = previous.map(owned_bindings).unwrap_or_default();
        stale.extend(owned_bindings(record));
        stale.retain(|id| !wanted.contains(id));
        self.registry.unregister_matching(|id| stale.contains(id)).await;

        self.request_all(desired).await
    }

    async fn sync_all_hotkeys(&self) {
        let desired: Vec<(BindingId, String)> = self.store.snapshot().iter().flat_map(profile_hotkeys).collect();
        let wanted: HashSet<BindingId> = desired.iter().map(|(id, _)| id.clone()).collect();

        let stale = self
            .registry
            .unregister_matching(|id| is_profile_owned(id) && !wanted.contains(id))
            .await;
        if !stale.is_empty() {
            debug!(count = stale.len(), "Released bindings of removed profiles");
        }

        for sync in self.request_all(desired).await {
            if !sync.status.registered && !sync.status.unsupported {
                warn!(id = %sync.id, accelerator = %sync.accelerator, conflicts = sync.status.conflicts.len(), "Profile hotkey not registered");
            }
        }
    }

    async fn request_all(&self, desired: Vec<(BindingId, String)>) -> Vec<HotkeySync> {
        if !self.hotkeys_enabled {
            return Vec::new();
        }

        let mut results = Vec::with_capacity(desired.len());
        for (id, accelerator) in desired {
            let outcome = self.registry.request(HotkeyRequest::new(id.clone(), accelerator.clone())).await;
            results.push(HotkeySync {
                id,
                accelerator,
                status: outcome.into(),
            });
        }
        results
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("hotkeys_enabled", &self.hotkeys_enabled)
            .field("active", &self.active())
            .finish()
    }
}

/// Bindings a record wants registered. Disabled profiles want none.
pub fn profile_hotkeys(record: &ProfileRecord) -> Vec<(BindingId, String)> {
    if !record.profile.enabled {
        return Vec::new();
    }

    let declared = |hotkey: &Option<String>| hotkey.as_deref().map(str::trim).filter(|h| !h.is_empty()).map(str::to_string);

    let mut desired = Vec::new();
    if let Some(accelerator) = declared(&record.profile.global_hotkey) {
        desired.push((BindingId::for_profile(record.id()), accelerator));
    }
    for slice in record.slices() {
        if let Some(accelerator) = declared(&slice.hotkey) {
            desired.push((BindingId::for_slice(slice.id), accelerator));
        }
    }
    desired
}

/// Every binding id a record could own, whether declared or not.
fn owned_bindings(record: &ProfileRecord) -> HashSet<BindingId> {
    std::iter::once(BindingId::for_profile(record.id()))
        .chain(record.slices().map(|slice| BindingId::for_slice(slice.id)))
        .collect()
}

fn is_profile_owned(id: &BindingId) -> bool {
    id.as_str().starts_with(BindingId::PROFILE_PREFIX) || id.as_str().starts_with(BindingId::SLICE_PREFIX)
}

#[cfg(test)]
mod tests;
