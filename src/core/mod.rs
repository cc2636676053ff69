// Copyright 2025 bakri (tidynest@proton.me)
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

//! src/core/mod.rs
//!
//! Core business logic module
//!
//! This module contains the declarative profile model and the pure
//! functions that work on it:
//! - Type definitions for profiles, rules, menus and context snapshots
//! - Accelerator parsing and normalisation
//! - Rule evaluation and rule encoding
//! - Menu hierarchy validation
//! - Active profile resolution
//!
//! Nothing here performs I/O or holds state, so every function can be
//! tested without an OS shortcut API or a file system.

pub mod accelerator;
pub mod encoding;
pub mod resolver;
pub mod rules;
pub mod types;
pub mod validator;

pub use accelerator::{Accelerator, AcceleratorError, Modifier};
pub use resolver::{resolve, resolve_detailed, ActivationReason, Resolution};
pub use rules::{evaluate, validate_rule, MatchResult, RuleError};
pub use types::*;
pub use validator::{validate_hierarchy, validate_record, HierarchyReport, ValidationError, Violation};

#[cfg(test)]
mod tests;
