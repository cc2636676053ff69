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

//! Authoritative in-memory profile store
//!
//! Readers get an `Arc` snapshot of the record list and never mutate it.
//! Every mutation replaces the snapshot and then notifies subscribers
//! synchronously, so a subscriber that reads after receiving an event
//! always sees at least that change.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::config::ProfileDocument;
use crate::core::{ProfileId, ProfileRecord};
use crate::engine::events::StoreEvent;

#[derive(Default)]
struct StoreState {
    profiles: Arc<Vec<ProfileRecord>>,
    pinned: Option<ProfileId>,
    subscribers: Vec<UnboundedSender<StoreEvent>>,
}

/// Owns the profile list and the manual pin
#[derive(Default)]
pub struct ProfileStore {
    state: Mutex<StoreState>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable view of the records in declaration order.
    pub fn snapshot(&self) -> Arc<Vec<ProfileRecord>> {
        self.state.lock().profiles.clone()
    }

    pub fn pinned(&self) -> Option<ProfileId> {
        self.state.lock().pinned
    }

    pub fn get(&self, id: ProfileId) -> Option<ProfileRecord> {
        self.state.lock().profiles.iter().find(|record| record.id() == id).cloned()
    }

    pub fn contains(&self, id: ProfileId) -> bool {
        self.state.lock().profiles.iter().any(|record| record.id() == id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        let (tx, rx) = unbounded_channel();
        self.state.lock().subscribers.push(tx);
        rx
    }

    /// Sets `updatedAt` to now and keeps the stored `createdAt`, if any.
    pub fn stamp(&self, mut record: ProfileRecord) -> ProfileRecord {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let existing = self.get(record.id()).and_then(|existing| existing.created_at);

        record.created_at = existing.or(record.created_at).or_else(|| Some(now.clone()));
        record.updated_at = Some(now);
        record
    }

    /// The document the store would hold after `edit`, without applying it.
    pub fn document_with<F>(&self, edit: F) -> ProfileDocument
    where
        F: FnOnce(&mut Vec<ProfileRecord>, &mut Option<ProfileId>),
    {
        let (mut profiles, mut pinned) = {
            let state = self.state.lock();
            (state.profiles.as_ref().clone(), state.pinned)
        };
        edit(&mut profiles, &mut pinned);
        ProfileDocument::new(profiles, pinned)
    }

    /// Inserts or replaces a record. Replacement keeps its position.
    pub fn upsert(&self, record: ProfileRecord) {
        let profile_id = record.id();
        self.mutate(StoreEvent::Upserted { profile_id }, |profiles, _| {
            upsert_into(profiles, record);
        });
    }

    /// Removes a record, clearing the pin if it pointed at it.
    pub fn remove(&self, id: ProfileId) -> Option<ProfileRecord> {
        let existing = self.get(id)?;
        self.mutate(StoreEvent::Removed { profile_id: id }, |profiles, pinned| {
            remove_from(profiles, pinned, id);
        });
        Some(existing)
    }

    pub fn set_pin(&self, profile_id: Option<ProfileId>) {
        if self.pinned() == profile_id {
            return;
        }
        self.mutate(StoreEvent::PinChanged { profile_id }, |_, pinned| {
            *pinned = profile_id;
        });
    }

    pub fn replace_all(&self, document: ProfileDocument) {
        self.mutate(StoreEvent::Replaced, move |profiles, pinned| {
            *profiles = document.profiles;
            *pinned = document.pinned_profile_id;
        });
    }

    fn mutate<F>(&self, event: StoreEvent, edit: F)
    where
        F: FnOnce(&mut Vec<ProfileRecord>, &mut Option<ProfileId>),
    {
        let mut state = self.state.lock();

        let mut profiles = state.profiles.as_ref().clone();
        edit(&mut profiles, &mut state.pinned);
        state.profiles = Arc::new(profiles);

        debug!(event = ?event, profiles = state.profiles.len(), "Profile store updated");
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Inserts or replaces by profile id, preserving declaration order.
pub fn upsert_into(profiles: &mut Vec<ProfileRecord>, record: ProfileRecord) {
    match profiles.iter_mut().find(|existing| existing.id() == record.id()) {
        Some(existing) => *existing = record,
        None => profiles.push(record),
    }
}

pub fn remove_from(profiles: &mut Vec<ProfileRecord>, pinned: &mut Option<ProfileId>, id: ProfileId) {
    profiles.retain(|record| record.id() != id);
    if *pinned == Some(id) {
        *pinned = None;
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProfileStore")
            .field("profiles", &state.profiles.len())
            .field("pinned", &state.pinned)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}
