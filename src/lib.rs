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

//! Radial Profiles
//!
//! Context-aware activation engine for radial (pie) menu profiles, with
//! global hotkey registration and conflict resolution.
//!
//! # Features
//!
//! - **Activation rules:** Match the foreground process, title, class or screen area
//! - **Profile resolution:** Manual pin, first matching rule, or a rule-less fallback
//! - **Menu validation:** Depth, slice count and cycle checks before anything is shown
//! - **Hotkey registry:** Local duplicate detection, reserved shortcuts, OS conflicts
//! - **Conflict resolution:** Override or disable-then-retry, with stale requests discarded
//! - **Atomic persistence:** Timestamped backups and schema migration
//!
//! # Architecture
//!
//! - **`core`:** Pure model and algorithms (rules, encoding, validation, resolution)
//! - **`hotkey`:** Binding table, OS shortcut seam, conflict state machine
//! - **`engine`:** Store, event loop and boundary operations
//! - **`config`:** Profiles document, settings, atomic writes
//! - **`watcher`:** Reloads the profiles file when it changes on disk
//!
//! # Examples
//!
//! ## Resolving the active profile
//!
//! ```
//! use radial_profiles::core::{
//!     resolve, ActionId, ActivationRule, ContextSnapshot, PieMenu, PieSlice, Profile, ProfileRecord,
//!     TextPattern,
//! };
//!
//! let mut root = PieMenu::new("Browser");
//! root.slices.push(PieSlice::action("Back", ActionId::new(), 0));
//! root.slices.push(PieSlice::action("Forward", ActionId::new(), 1));
//!
//! let mut profile = Profile::new("Browser", root.id);
//! profile.activation_rules = vec![ActivationRule::process_name(TextPattern::literal("chrome.exe"))];
//! let record = ProfileRecord::new(profile, vec![root]);
//!
//! let ctx = ContextSnapshot::empty().with_process("chrome.exe");
//! assert_eq!(resolve(&[record.clone()], &ctx, None), Some(record.id()));
//! ```
//!
//! ## Registering a hotkey
//!
//! ```
//! use radial_profiles::hotkey::{HotkeyRegistry, HotkeyRequest, MemoryBackend};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let registry = HotkeyRegistry::new(Arc::new(MemoryBackend::new()));
//! let outcome = registry.request(HotkeyRequest::new("profile:main", "Ctrl+Alt+Space")).await;
//! assert!(outcome.is_registered());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod hotkey;
pub mod logging;
pub mod watcher;

// Re-export commonly used types for convenience
pub use core::{ActivationRule, ContextSnapshot, ProfileId, ProfileRecord};
pub use engine::{Engine, EngineError, EngineEvent, EngineHandle};
pub use hotkey::{BindingId, ConflictCode, HotkeyRegistry, HotkeyRequest};
