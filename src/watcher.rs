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

//! File system watcher for the profiles file
//!
//! Uses OS-level file watching via the notify crate. The parent directory is
//! watched rather than the file, since atomic saves replace the file by
//! renaming a temp file over it.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tracing::{debug, warn};

use crate::engine::EngineEvent;

/// Posts `EngineEvent::ProfilesFileChanged` whenever the profiles file changes.
///
/// Dropping the watcher stops it.
pub struct ProfilesWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ProfilesWatcher {
    pub fn new(path: PathBuf, events: Sender<EngineEvent>) -> Result<Self, notify::Error> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::generic("Profiles path has no file name"))?;
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => notify_engine(&events),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Profiles watcher error"),
            },
            Config::default(),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "Watching profiles file");

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

fn notify_engine(events: &Sender<EngineEvent>) {
    match events.try_send(EngineEvent::ProfilesFileChanged) {
        Ok(()) => {}
        // A reload is already queued
        Err(TrySendError::Full(_)) => debug!("Reload already pending"),
        Err(TrySendError::Closed(_)) => debug!("Engine stopped, ignoring profiles change"),
    }
}
