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

use std::path::PathBuf;
use thiserror::Error;

use crate::core::encoding::DecodeError;
use crate::core::ProfileId;

/// Errors that can occur while loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Profiles file does not exist.
    #[error("Profiles file not found: {0}")]
    NotFound(PathBuf),
    /// Backup directory cannot be created or written to.
    #[error("Backup directory not writable: {0}")]
    BackupDirNotWritable(PathBuf),
    /// Failed to create backup file.
    #[error("Failed to create backup: {0}")]
    BackupFailed(String),
    /// Atomic write operation failed.
    #[error("Atomic write failed: {0}")]
    WriteFailed(String),
    /// Profiles document is not valid JSON for its schema.
    #[error("Invalid profiles document: {0}")]
    Parse(#[from] serde_json::Error),
    /// Profiles document declares a schema this build cannot read.
    #[error("Unsupported profiles schema version {0}")]
    UnsupportedSchema(u32),
    /// A schema v1 rule value could not be decoded.
    #[error("Profile {profile}: rule {index}: {source}")]
    LegacyRule {
        profile: ProfileId,
        index: usize,
        #[source]
        source: DecodeError,
    },
    /// Settings file is not valid TOML for the settings schema.
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    /// Path could not be expanded.
    #[error("Cannot expand path '{path}': {message}")]
    PathExpansion { path: String, message: String },
    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
