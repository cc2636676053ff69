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

//! Profile persistence and engine settings
//!
//! - **Atomic writes**: temp-file-then-rename, the document is never half written
//! - **Automatic backups**: every save of an existing file keeps a timestamped copy
//! - **Schema migration**: v1 documents are read and saved back as v2
//! - **Settings**: TOML, every field defaulted
//!
//! # Example
//!
//! ```no_run
//! use radial_profiles::config::ProfileRepository;
//!
//! let repository = ProfileRepository::new("/home/user/.config/radial-profiles/profiles.json".into())?;
//! let document = repository.load()?;
//! println!("{} profiles", document.profiles.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub mod schema;
pub mod settings;
mod transaction;

pub use error::ConfigError;
pub use schema::{ProfileDocument, SCHEMA_VERSION};
pub use settings::EngineSettings;
pub use transaction::ProfileTransaction;

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads and writes the profiles document.
#[derive(Debug)]
pub struct ProfileRepository {
    path: PathBuf,
    backup_dir: PathBuf,
    backups: bool,
}

impl ProfileRepository {
    /// Creates a repository for `path`. The file itself may not exist yet.
    ///
    /// Backups go to a `backups/` directory next to the file, created on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::BackupDirNotWritable` if the path has no parent
    /// directory.
    pub fn new(path: PathBuf) -> Result<Self, ConfigError> {
        if path.read_link().is_ok() {
            warn!(path = %path.display(), "Profiles file is a symlink");
        }

        let backup_dir = path
            .parent()
            .ok_or_else(|| ConfigError::BackupDirNotWritable(PathBuf::from("Profiles file has no parent directory")))?
            .join("backups");

        Ok(Self {
            path,
            backup_dir,
            backups: true,
        })
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn backups_enabled(&self) -> bool {
        self.backups
    }

    /// Loads the document. A missing file is an empty document.
    pub fn load(&self) -> Result<ProfileDocument, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No profiles file yet, starting empty");
            return Ok(ProfileDocument::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let document = ProfileDocument::from_json(&content)?;
        info!(
            path = %self.path.display(),
            profiles = document.profiles.len(),
            "Loaded profiles"
        );
        Ok(document)
    }

    /// Saves the document atomically, returning the backup path if one was taken.
    pub fn save(&self, document: &ProfileDocument) -> Result<Option<PathBuf>, ConfigError> {
        let content = document.to_json()?;
        let tx = ProfileTransaction::begin(self)?;
        let backup = tx.commit(&content)?;

        info!(
            path = %self.path.display(),
            profiles = document.profiles.len(),
            backup = ?backup,
            "Saved profiles"
        );
        Ok(backup)
    }

    /// Backups of the profiles file, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}.", self.file_name()?);
        let mut backups: Vec<PathBuf> = fs::read_dir(&self.backup_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();

        backups.sort();
        Ok(backups)
    }

    fn create_timestamped_backup(&self) -> Result<PathBuf, ConfigError> {
        if !self.backup_dir.exists() {
            fs::create_dir_all(&self.backup_dir)
                .map_err(|_| ConfigError::BackupDirNotWritable(self.backup_dir.clone()))?;
        }

        let content = fs::read_to_string(&self.path)?;

        // YYYY-MM-DD_HHMMSS, with a counter when two saves share a second
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
        let base = format!("{}.{}", self.file_name()?, timestamp);

        let mut backup_path = self.backup_dir.join(&base);
        let mut counter = 1;
        while backup_path.exists() {
            backup_path = self.backup_dir.join(format!("{}-{}", base, counter));
            counter += 1;
        }

        fs::write(&backup_path, &content).map_err(|e| ConfigError::BackupFailed(e.to_string()))?;
        debug!(backup = %backup_path.display(), "Created profiles backup");
        Ok(backup_path)
    }

    fn file_name(&self) -> Result<&str, ConfigError> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ConfigError::BackupFailed(format!("Invalid profiles file name: {}", self.path.display())))
    }
}

/// Expands `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::PathExpansion {
            path: raw.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests;
