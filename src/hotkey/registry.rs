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

//! Hotkey registry: the authoritative binding table
//!
//! One binding per logical id. A request goes through these steps:
//! 1. Local checks under the table lock: parse, internal duplicates,
//!    reserved shortcuts. Passing them marks the binding pending in the
//!    same critical section, so two ids can never both pass for one
//!    accelerator.
//! 2. Release of the id's previous accelerator (not restored on failure).
//!    A binding displaced by an overriding request is marked `conflicted`
//!    in step 1, and the OS registration is only released by whoever
//!    holds the accelerator in the table at that moment.
//! 3. OS availability query, then OS registration, each under a timeout
//! 4. Commit, unless the request token went stale meanwhile, in which case
//!    the fresh OS registration is rolled back
//!
//! Calls for one id are serialised by a per-id async mutex; calls for
//! different ids run concurrently. The table itself sits behind a
//! `parking_lot` mutex that is never held across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::Accelerator;
use crate::hotkey::backend::{
    BackendError, HotkeyEventPayload, HotkeyTrigger, ShortcutBackend, DEFAULT_TRIGGER_EVENT,
};
use crate::hotkey::conflict::{
    BindingId, BindingStatus, ConflictCode, ConflictDetector, ConflictEntry, ConflictReport,
    ReservedShortcuts,
};

/// Upper bound for a single OS shortcut call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(2);

fn default_event() -> String {
    DEFAULT_TRIGGER_EVENT.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A registration request as received at the boundary
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotkeyRequest {
    pub id: BindingId,
    pub accelerator: String,
    #[serde(default = "default_event")]
    pub event: String,
    /// Skip the internal duplicate check and displace the other binding
    #[serde(default)]
    pub allow_conflicts: bool,
}

impl HotkeyRequest {
    pub fn new(id: impl Into<BindingId>, accelerator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            accelerator: accelerator.into(),
            event: default_event(),
            allow_conflicts: false,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = event.into();
        self
    }

    pub fn allowing_conflicts(mut self) -> Self {
        self.allow_conflicts = true;
        self
    }
}

/// A row of the binding table
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub id: BindingId,
    pub accelerator: String,
    pub event: String,
    pub status: BindingStatus,
}

/// Identifies one request for a binding id; newer tokens invalidate older ones.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Typed result of a registration request
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RegistrationOutcome {
    Registered,
    /// Accelerator unusable as requested; the user has to choose
    Conflicted(ConflictReport),
    /// The OS call failed; the binding is left `failed`
    Failed(ConflictReport),
    /// No OS integration in this environment
    Unsupported,
    /// A newer request for the same id took over
    Superseded,
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered)
    }

    pub fn report(&self) -> Option<&ConflictReport> {
        match self {
            RegistrationOutcome::Conflicted(report) | RegistrationOutcome::Failed(report) => Some(report),
            _ => None,
        }
    }
}

/// Boundary shape: `{registered, conflicts}`
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatus {
    pub registered: bool,
    pub conflicts: Vec<ConflictEntry>,
    #[serde(skip_serializing_if = "is_false")]
    pub unsupported: bool,
}

impl From<RegistrationOutcome> for RegistrationStatus {
    fn from(outcome: RegistrationOutcome) -> Self {
        match outcome {
            RegistrationOutcome::Registered => Self {
                registered: true,
                ..Self::default()
            },
            RegistrationOutcome::Conflicted(report) | RegistrationOutcome::Failed(report) => Self {
                conflicts: report.into_entries(),
                ..Self::default()
            },
            RegistrationOutcome::Unsupported => Self {
                unsupported: true,
                ..Self::default()
            },
            RegistrationOutcome::Superseded => Self::default(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    binding: Binding,
    accelerator: Option<Accelerator>,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<BindingId, Entry>,
    /// Holders of registered and pending accelerators
    detector: ConflictDetector,
    pending: HashMap<BindingId, Accelerator>,
    live: HashMap<BindingId, u64>,
}

impl Table {
    fn status(&self, id: &BindingId) -> Option<BindingStatus> {
        self.entries.get(id).map(|entry| entry.binding.status)
    }

    fn commit(&mut self, request: &HotkeyRequest, accelerator: Option<&Accelerator>, status: BindingStatus) {
        if status == BindingStatus::Registered {
            if let Some(accelerator) = accelerator {
                self.detector.hold(accelerator.clone(), request.id.clone());
            }
        }

        let binding = Binding {
            id: request.id.clone(),
            accelerator: accelerator
                .map(|a| a.to_string())
                .unwrap_or_else(|| request.accelerator.clone()),
            event: request.event.clone(),
            status,
        };
        self.entries.insert(
            request.id.clone(),
            Entry {
                binding,
                accelerator: accelerator.cloned(),
            },
        );
    }

    /// Records a local conflict. An existing registration stays untouched.
    fn mark_conflicted(&mut self, request: &HotkeyRequest, accelerator: Option<&Accelerator>) {
        if self.status(&request.id) == Some(BindingStatus::Registered) {
            return;
        }
        self.commit(request, accelerator, BindingStatus::Conflicted);
    }

    fn set_status(&mut self, id: &BindingId, status: BindingStatus) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.binding.status = status;
        }
    }

    fn finish_pending(&mut self, id: &BindingId) {
        let Some(accelerator) = self.pending.remove(id) else {
            return;
        };

        let committed = self.entries.get(id).is_some_and(|entry| {
            entry.binding.status == BindingStatus::Registered
                && entry.accelerator.as_ref() == Some(&accelerator)
        });
        if !committed {
            self.detector.release(&accelerator, id);
        }
    }
}

/// Clears the pending mark however the request ends, including when its
/// future is dropped.
struct PendingGuard<'a> {
    table: &'a Mutex<Table>,
    id: BindingId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.lock().finish_pending(&self.id);
    }
}

enum Plan {
    /// Same accelerator already registered for this id
    Unchanged,
    Conflicts(ConflictReport),
    Proceed {
        previous: Option<Accelerator>,
        displace: Option<BindingId>,
    },
}

/// Owns every global shortcut the application holds.
pub struct HotkeyRegistry {
    backend: Arc<dyn ShortcutBackend>,
    reserved: ReservedShortcuts,
    timeout: Duration,
    table: Mutex<Table>,
    id_locks: Mutex<HashMap<BindingId, Arc<tokio::sync::Mutex<()>>>>,
    next_token: AtomicU64,
}

impl HotkeyRegistry {
    pub fn new(backend: Arc<dyn ShortcutBackend>) -> Self {
        Self {
            backend,
            reserved: ReservedShortcuts::platform(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
            table: Mutex::new(Table::default()),
            id_locks: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn with_reserved(mut self, reserved: ReservedShortcuts) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.backend.is_available()
    }

    /// Issues a new live token for `id`, invalidating any older one.
    pub fn begin(&self, id: &BindingId) -> RequestToken {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        self.table.lock().live.insert(id.clone(), token);
        RequestToken(token)
    }

    pub fn is_live(&self, id: &BindingId, token: RequestToken) -> bool {
        self.table.lock().live.get(id) == Some(&token.0)
    }

    /// Abandons the request behind `token`.
    ///
    /// A binding that only exists because of the abandoned request's
    /// conflict is dropped again; registered bindings are left as they are.
    /// Returns false when the token was already stale.
    pub fn cancel(&self, id: &BindingId, token: RequestToken) -> bool {
        let mut table = self.table.lock();
        if table.live.get(id) != Some(&token.0) {
            return false;
        }
        table.live.remove(id);

        if table.status(id) == Some(BindingStatus::Conflicted) {
            table.entries.remove(id);
        }
        debug!(id = %id, token = token.0, "Cancelled hotkey request");
        true
    }

    /// Requests a binding with a fresh token.
    pub async fn request(&self, request: HotkeyRequest) -> RegistrationOutcome {
        let token = self.begin(&request.id);
        self.submit(request, token).await
    }

    /// Runs a request under an already issued token.
    pub async fn submit(&self, request: HotkeyRequest, token: RequestToken) -> RegistrationOutcome {
        if !self.backend.is_available() {
            debug!(id = %request.id, "Global shortcuts unavailable");
            return RegistrationOutcome::Unsupported;
        }

        let lock = self.id_lock(&request.id);
        let _serial = lock.lock().await;

        if !self.is_live(&request.id, token) {
            debug!(id = %request.id, token = token.0, "Dropping stale hotkey request");
            return RegistrationOutcome::Superseded;
        }

        let accelerator = match Accelerator::parse(&request.accelerator) {
            Ok(accelerator) => accelerator,
            Err(e) => {
                self.table.lock().mark_conflicted(&request, None);
                debug!(id = %request.id, error = %e, "Rejected invalid accelerator");
                return RegistrationOutcome::Conflicted(ConflictReport::single(ConflictEntry::invalid(&e)));
            }
        };

        let plan = {
            let mut table = self.table.lock();
            self.plan(&mut table, &request, &accelerator)
        };

        let (previous, displace) = match plan {
            Plan::Unchanged => {
                let mut table = self.table.lock();
                if let Some(entry) = table.entries.get_mut(&request.id) {
                    entry.binding.event = request.event.clone();
                }
                debug!(id = %request.id, accelerator = %accelerator, "Hotkey already registered");
                return RegistrationOutcome::Registered;
            }
            Plan::Conflicts(report) => {
                debug!(id = %request.id, accelerator = %accelerator, conflicts = report.entries().len(), "Local hotkey conflict");
                return RegistrationOutcome::Conflicted(report);
            }
            Plan::Proceed { previous, displace } => (previous, displace),
        };

        let _pending = PendingGuard {
            table: &self.table,
            id: request.id.clone(),
        };

        if let Some(previous) = previous {
            self.release(&request.id, &previous).await;
        }
        if let Some(other) = displace {
            self.displace(&other, &accelerator).await;
        }

        match self.call(self.backend.is_registered(&accelerator)).await {
            Ok(false) => {}
            Ok(true) => {
                let entry = ConflictEntry::new(
                    ConflictCode::AlreadyRegistered,
                    format!("Accelerator '{}' is already registered", accelerator),
                );
                self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Conflicted);
                return RegistrationOutcome::Conflicted(ConflictReport::single(entry));
            }
            Err(BackendError::Unavailable) => {
                self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Unregistered);
                return RegistrationOutcome::Unsupported;
            }
            Err(e) => {
                warn!(id = %request.id, accelerator = %accelerator, error = %e, "Hotkey availability check failed");
                self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Failed);
                return RegistrationOutcome::Failed(ConflictReport::single(e.check_conflict()));
            }
        }

        if !self.is_live(&request.id, token) {
            self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Unregistered);
            return RegistrationOutcome::Superseded;
        }

        let trigger = HotkeyTrigger {
            event: request.event.clone(),
            payload: HotkeyEventPayload {
                id: request.id.clone(),
                accelerator: accelerator.to_string(),
            },
        };

        match self.call(self.backend.register(&accelerator, trigger)).await {
            Ok(()) => {}
            Err(BackendError::Unavailable) => {
                self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Unregistered);
                return RegistrationOutcome::Unsupported;
            }
            Err(e) => {
                let entry = e.registration_conflict();
                warn!(id = %request.id, accelerator = %accelerator, error = %e, "Hotkey registration failed");

                return if entry.code == ConflictCode::AlreadyRegistered {
                    self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Conflicted);
                    RegistrationOutcome::Conflicted(ConflictReport::single(entry))
                } else {
                    self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Failed);
                    RegistrationOutcome::Failed(ConflictReport::single(entry))
                };
            }
        }

        // A slow OS response must not resurrect an abandoned request
        if !self.is_live(&request.id, token) {
            if let Err(e) = self.call(self.backend.unregister(&accelerator)).await {
                warn!(id = %request.id, accelerator = %accelerator, error = %e, "Failed to roll back stale registration");
            }
            self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Unregistered);
            info!(id = %request.id, accelerator = %accelerator, "Rolled back superseded hotkey registration");
            return RegistrationOutcome::Superseded;
        }

        self.table.lock().commit(&request, Some(&accelerator), BindingStatus::Registered);
        info!(id = %request.id, accelerator = %accelerator, event = %request.event, "Registered hotkey");
        RegistrationOutcome::Registered
    }

    fn plan(&self, table: &mut Table, request: &HotkeyRequest, accelerator: &Accelerator) -> Plan {
        let current = table.entries.get(&request.id);
        let registered_accelerator = current
            .filter(|entry| entry.binding.status == BindingStatus::Registered)
            .and_then(|entry| entry.accelerator.clone());

        if registered_accelerator.as_ref() == Some(accelerator) {
            return Plan::Unchanged;
        }

        let mut report = ConflictReport::new();
        let mut displace = None;

        if let Some(holder) = table.detector.holder_other_than(accelerator, &request.id) {
            // An in-flight request cannot be displaced
            let holder_registered = table.status(holder) == Some(BindingStatus::Registered)
                && !table.pending.contains_key(holder);

            if request.allow_conflicts && holder_registered {
                displace = Some(holder.clone());
            } else {
                report.push(ConflictEntry::duplicate_internal(accelerator, holder.clone()));
            }
        }

        if self.reserved.contains(accelerator) {
            report.push(ConflictEntry::reserved(accelerator));
        }

        if !report.is_empty() {
            table.mark_conflicted(request, Some(accelerator));
            return Plan::Conflicts(report);
        }

        if let Some(other) = &displace {
            table.set_status(other, BindingStatus::Conflicted);
        }
        table.pending.insert(request.id.clone(), accelerator.clone());
        table.detector.hold(accelerator.clone(), request.id.clone());

        Plan::Proceed {
            previous: registered_accelerator,
            displace,
        }
    }

    /// Releases the id's previous accelerator ahead of a replacement.
    async fn release(&self, id: &BindingId, previous: &Accelerator) {
        let still_held = self.table.lock().detector.holder(previous) == Some(id);
        if !still_held {
            debug!(id = %id, accelerator = %previous, "Previous accelerator has a new holder, leaving it registered");
        } else if let Err(e) = self.call(self.backend.unregister(previous)).await {
            warn!(id = %id, accelerator = %previous, error = %e, "Failed to release previous accelerator");
        }

        let mut table = self.table.lock();
        table.detector.release(previous, id);
        table.set_status(id, BindingStatus::Unregistered);
        debug!(id = %id, accelerator = %previous, "Released previous accelerator");
    }

    /// Releases the OS registration of a binding `plan` already displaced.
    async fn displace(&self, other: &BindingId, accelerator: &Accelerator) {
        if let Err(e) = self.call(self.backend.unregister(accelerator)).await {
            warn!(id = %other, accelerator = %accelerator, error = %e, "Failed to release displaced binding");
        }
        info!(id = %other, accelerator = %accelerator, "Displaced internal binding");
    }

    /// Releases and forgets a binding. Unknown ids are a no-op.
    ///
    /// Returns whether a binding was removed. Any request still in flight for
    /// the id is invalidated.
    pub async fn unregister(&self, id: &BindingId) -> bool {
        self.table.lock().live.remove(id);

        let lock = self.id_lock(id);
        let _serial = lock.lock().await;

        let removed = {
            let mut table = self.table.lock();
            let removed = table.entries.remove(id);
            if let Some(accelerator) = removed.as_ref().and_then(|entry| entry.accelerator.as_ref()) {
                table.detector.release(accelerator, id);
            }
            removed
        };

        let Some(entry) = removed else {
            self.forget_id_lock(id, &lock);
            debug!(id = %id, "Unregister of unknown binding ignored");
            return false;
        };

        if entry.binding.status == BindingStatus::Registered {
            if let Some(accelerator) = &entry.accelerator {
                if let Err(e) = self.call(self.backend.unregister(accelerator)).await {
                    // Internal tracking is already updated
                    warn!(id = %id, accelerator = %accelerator, error = %e, "Failed to unregister hotkey");
                }
            }
        }

        self.forget_id_lock(id, &lock);
        info!(id = %id, accelerator = %entry.binding.accelerator, "Unregistered hotkey");
        true
    }

    /// Unregisters every known binding whose id satisfies `matches`.
    pub async fn unregister_matching<F>(&self, matches: F) -> Vec<BindingId>
    where
        F: Fn(&BindingId) -> bool,
    {
        let mut ids: Vec<BindingId> = {
            let table = self.table.lock();
            table
                .entries
                .keys()
                .chain(table.pending.keys())
                .chain(table.live.keys())
                .filter(|id| matches(id))
                .cloned()
                .collect()
        };
        ids.sort();
        ids.dedup();

        for id in &ids {
            self.unregister(id).await;
        }
        ids
    }

    /// Reports what a request for `accelerator` would run into, without
    /// registering anything. `ignore` is treated as not holding anything.
    pub async fn check(&self, accelerator: &str, ignore: Option<&BindingId>) -> Result<ConflictReport, BackendError> {
        if !self.backend.is_available() {
            return Err(BackendError::Unavailable);
        }

        let accelerator = match Accelerator::parse(accelerator) {
            Ok(accelerator) => accelerator,
            Err(e) => return Ok(ConflictReport::single(ConflictEntry::invalid(&e))),
        };

        let mut report = ConflictReport::new();
        let holder = self
            .table
            .lock()
            .detector
            .holder(&accelerator)
            .filter(|holder| Some(*holder) != ignore)
            .cloned();
        let internally_held = holder.is_some();

        if let Some(holder) = holder {
            report.push(ConflictEntry::duplicate_internal(&accelerator, holder));
        }
        if self.reserved.contains(&accelerator) {
            report.push(ConflictEntry::reserved(&accelerator));
        }

        let own = ignore.is_some_and(|id| self.table.lock().detector.holder(&accelerator) == Some(id));
        if !internally_held && !own {
            match self.call(self.backend.is_registered(&accelerator)).await {
                Ok(true) => report.push(ConflictEntry::new(
                    ConflictCode::AlreadyRegistered,
                    format!("Accelerator '{}' is already registered", accelerator),
                )),
                Ok(false) => {}
                Err(e) => report.push(e.check_conflict()),
            }
        }

        Ok(report)
    }

    /// Snapshot of the binding table, sorted by id.
    pub fn bindings(&self) -> Vec<Binding> {
        let table = self.table.lock();

        let mut bindings: Vec<Binding> = table
            .entries
            .values()
            .map(|entry| {
                let mut binding = entry.binding.clone();
                if let Some(pending) = table.pending.get(&binding.id) {
                    binding.status = BindingStatus::Pending;
                    binding.accelerator = pending.to_string();
                }
                binding
            })
            .collect();

        for (id, accelerator) in &table.pending {
            if !table.entries.contains_key(id) {
                bindings.push(Binding {
                    id: id.clone(),
                    accelerator: accelerator.to_string(),
                    event: default_event(),
                    status: BindingStatus::Pending,
                });
            }
        }

        bindings.sort_by(|a, b| a.id.cmp(&b.id));
        bindings
    }

    pub fn binding(&self, id: &BindingId) -> Option<Binding> {
        self.bindings().into_iter().find(|binding| &binding.id == id)
    }

    pub fn status(&self, id: &BindingId) -> BindingStatus {
        self.binding(id)
            .map(|binding| binding.status)
            .unwrap_or(BindingStatus::Unregistered)
    }

    /// Whether the registry keeps any state for `id`.
    pub fn is_tracked(&self, id: &BindingId) -> bool {
        let in_table = {
            let table = self.table.lock();
            table.entries.contains_key(id) || table.pending.contains_key(id) || table.live.contains_key(id)
        };
        in_table || self.id_locks.lock().contains_key(id)
    }

    fn id_lock(&self, id: &BindingId) -> Arc<tokio::sync::Mutex<()>> {
        self.id_locks.lock().entry(id.clone()).or_default().clone()
    }

    /// Drops the id's lock unless another call holds or awaits it.
    fn forget_id_lock(&self, id: &BindingId, held: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.id_locks.lock();
        // One reference in the map, one in `held`
        if Arc::strong_count(held) <= 2 && locks.get(id).is_some_and(|lock| Arc::ptr_eq(lock, held)) {
            locks.remove(id);
        }
    }

    async fn call<T, F>(&self, operation: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::TimedOut(self.timeout)),
        }
    }
}

impl std::fmt::Debug for HotkeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotkeyRegistry")
            .field("reserved", &self.reserved.len())
            .field("timeout", &self.timeout)
            .field("bindings", &self.table.lock().entries.len())
            .finish()
    }
}
