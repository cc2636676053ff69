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

//! Structured logging setup
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`,
//! when set and valid, replaces the configured filter.

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("A global logger is already installed")]
    AlreadyInitialised,
}

/// Installs the global subscriber.
pub fn init(configured: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(configured)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialised)
}

fn parse_filter(raw: &str) -> Result<EnvFilter, LoggingError> {
    let raw = if raw.trim().is_empty() { "info" } else { raw };

    EnvFilter::try_new(raw).map_err(|e| LoggingError::InvalidFilter {
        filter: raw.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_accepts_directives() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("radial_profiles=debug,warn").is_ok());
        assert!(parse_filter("").is_ok());
    }

    #[test]
    fn test_parse_filter_rejects_bad_level() {
        let error = parse_filter("radial_profiles=loud").unwrap_err();
        assert!(matches!(error, LoggingError::InvalidFilter { .. }));
    }
}
