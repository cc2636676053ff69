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

//! Profiles file transaction with automatic backup
//!
//! Provides atomic write operations:
//! - **Atomic**: temp file plus rename, never a half-written document
//! - **Durable**: a timestamped backup exists before anything is replaced
//!
//! # Lifecycle
//!
//! 1. `begin()` - Creates the backup (when the file exists and backups are on)
//! 2. Caller renders the new document in memory
//! 3. `commit()` - Writes atomically; on failure the old file stays in place

use atomic_write_file::AtomicWriteFile;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::config::{ConfigError, ProfileRepository};

/// Atomic write of the profiles file.
///
/// # Example
///
/// ```no_run
/// use radial_profiles::config::{ProfileRepository, ProfileTransaction};
/// use std::path::PathBuf;
///
/// let repository = ProfileRepository::new(PathBuf::from("profiles.json"))?;
/// let tx = ProfileTransaction::begin(&repository)?;
/// tx.commit("{\"schemaVersion\": 2, \"profiles\": []}\n")?;
/// # Ok::<(), radial_profiles::config::ConfigError>(())
/// ```
pub struct ProfileTransaction<'a> {
    repository: &'a ProfileRepository,
    backup_path: Option<PathBuf>,
}

impl<'a> ProfileTransaction<'a> {
    /// Begins a transaction, backing up the current file first.
    ///
    /// A missing file (first save) has nothing to back up.
    pub fn begin(repository: &'a ProfileRepository) -> Result<Self, ConfigError> {
        let backup_path = if repository.backups_enabled() && repository.path().exists() {
            Some(repository.create_timestamped_backup()?)
        } else {
            None
        };

        Ok(Self {
            repository,
            backup_path,
        })
    }

    /// Backup taken by `begin()`, if any.
    pub fn backup_path(&self) -> Option<&PathBuf> {
        self.backup_path.as_ref()
    }

    /// Atomically replaces the profiles file with `new_content`.
    ///
    /// Consumes the transaction. On error the original file is untouched.
    pub fn commit(self, new_content: &str) -> Result<Option<PathBuf>, ConfigError> {
        write_atomic(self.repository.path(), new_content)?;
        debug!(path = %self.repository.path().display(), "Committed profiles file");
        Ok(self.backup_path)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = AtomicWriteFile::options()
        .open(path)
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to open for atomic write: {}", e)))?;

    file.write_all(content.as_bytes())
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to write content: {}", e)))?;

    file.commit()
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to commit atomic write: {}", e)))?;

    Ok(())
}
