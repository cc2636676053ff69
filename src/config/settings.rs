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

//! Engine settings (`settings.toml`)
//!
//! Every field has a default, so an empty or missing file is valid:
//!
//! ```toml
//! profiles_path = "~/.config/radial-profiles/profiles.json"
//! backups = true
//! backend_timeout_ms = 2000
//! reserved_accelerators = ["Ctrl+Alt+End"]
//! log_filter = "info"
//! hotkeys_enabled = true
//! watch_profiles = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::config::{expand_path, ConfigError};
use crate::hotkey::ReservedShortcuts;

pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/radial-profiles/settings.toml";
pub const DEFAULT_PROFILES_PATH: &str = "~/.config/radial-profiles/profiles.json";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    pub profiles_path: String,
    /// Keep a timestamped copy before each save
    pub backups: bool,
    /// Upper bound for each OS shortcut call
    pub backend_timeout_ms: u64,
    /// Added to the platform's reserved list
    pub reserved_accelerators: Vec<String>,
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub log_filter: String,
    /// When false, no global shortcut is ever registered
    pub hotkeys_enabled: bool,
    /// Reload when the profiles file changes on disk
    pub watch_profiles: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            profiles_path: DEFAULT_PROFILES_PATH.to_string(),
            backups: true,
            backend_timeout_ms: 2000,
            reserved_accelerators: Vec::new(),
            log_filter: "info".to_string(),
            hotkeys_enabled: true,
            watch_profiles: true,
        }
    }
}

impl EngineSettings {
    /// Loads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        expand_path(DEFAULT_SETTINGS_PATH)
    }

    pub fn profiles_path(&self) -> Result<PathBuf, ConfigError> {
        expand_path(&self.profiles_path)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms.max(1))
    }

    /// Platform list plus the configured extras. Unparseable extras are
    /// logged and skipped.
    pub fn reserved_shortcuts(&self) -> ReservedShortcuts {
        let mut reserved = ReservedShortcuts::platform();
        for error in reserved.extend(&self.reserved_accelerators) {
            warn!(error = %error, "Ignoring reserved accelerator from settings");
        }
        reserved
    }
}
