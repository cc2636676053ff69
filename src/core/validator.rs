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

//! Structural validation of profiles and their menu hierarchies
//!
//! Two layers:
//! - [`validate_hierarchy`]: depth and slice-count bounds of the menu graph
//!   reachable from the profile's root, walked depth-first with a visited set
//! - [`validate_record`]: everything the editor must fix before a save is
//!   accepted (names, rules, references, hierarchy)
//!
//! # Drafts versus presentable menus
//! A menu with zero slices is a draft. Drafts may be saved, but a profile
//! containing one is never presentable, so the resolver skips it.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::core::rules::{validate_rules, RuleError};
use crate::core::types::{PieMenu, PieMenuId, PieSliceId, ProfileId, ProfileRecord};

/// Maximum nesting depth; the root menu alone has depth 1.
pub const MAX_MENU_DEPTH: usize = 3;
/// Maximum slices in one menu.
pub const MAX_SLICES: usize = 12;
/// Minimum slices in a completed menu.
pub const MIN_SLICES: usize = 2;

/// A structural problem in a menu hierarchy
#[derive(Clone, Debug, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    #[error("Menu hierarchy depth {actual} exceeds maximum {max}")]
    DepthExceeded { actual: usize, max: usize },

    #[error("Menu {menu_id} has {count} slices (max {max})")]
    TooManySlices {
        menu_id: PieMenuId,
        count: usize,
        max: usize,
    },

    #[error("Menu {menu_id} has {count} slices (min {min})")]
    TooFewSlices {
        menu_id: PieMenuId,
        count: usize,
        min: usize,
    },

    #[error("Root menu {menu_id} not found")]
    MissingRootMenu { menu_id: PieMenuId },

    #[error("Slice {slice_id} in menu {menu_id} points to missing menu {child_id}")]
    MissingChildMenu {
        menu_id: PieMenuId,
        slice_id: PieSliceId,
        child_id: PieMenuId,
    },

    #[error("Menu {menu_id} is reachable from itself")]
    CycleDetected { menu_id: PieMenuId },
}

impl Violation {
    /// Draft-only violations: empty menus still being edited.
    pub fn is_draft_only(&self) -> bool {
        matches!(self, Violation::TooFewSlices { count: 0, .. })
    }
}

/// Result of walking a profile's menu graph
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyReport {
    pub depth: usize,
    pub violations: Vec<Violation>,
}

impl HierarchyReport {
    /// No violations at all: safe to present.
    pub fn is_presentable(&self) -> bool {
        self.violations.is_empty()
    }

    /// Only draft-tolerated violations remain.
    pub fn is_saveable(&self) -> bool {
        self.violations.iter().all(Violation::is_draft_only)
    }
}

/// Computes depth and slice-count violations from the root menu.
///
/// A menu shared by several branches counts along its deepest path. A menu
/// reached again while still on the current path is reported as a cycle and
/// adds no depth.
///
/// # Example
/// ```
/// use radial_profiles::core::validator::validate_hierarchy;
/// use radial_profiles::core::{ActionId, PieMenu, PieSlice, Profile, ProfileRecord};
///
/// let mut root = PieMenu::new("Main");
/// root.slices.push(PieSlice::action("Copy", ActionId::new(), 0));
/// root.slices.push(PieSlice::action("Paste", ActionId::new(), 1));
/// let record = ProfileRecord::new(Profile::new("Default", root.id), vec![root]);
///
/// let report = validate_hierarchy(&record);
/// assert_eq!(report.depth, 1);
/// assert!(report.is_presentable());
/// ```
pub fn validate_hierarchy(record: &ProfileRecord) -> HierarchyReport {
    let menus: HashMap<PieMenuId, &PieMenu> = record.menus.iter().map(|m| (m.id, m)).collect();
    let root = record.profile.root_menu;

    let mut report = HierarchyReport::default();

    if !menus.contains_key(&root) {
        report.violations.push(Violation::MissingRootMenu { menu_id: root });
        return report;
    }

    let mut walk = Walk {
        menus: &menus,
        depths: HashMap::new(),
        on_path: HashSet::new(),
        violations: Vec::new(),
    };
    let depth = walk.visit(root);

    report.depth = depth;
    report.violations = walk.violations;

    if depth > MAX_MENU_DEPTH {
        report.violations.insert(
            0,
            Violation::DepthExceeded {
                actual: depth,
                max: MAX_MENU_DEPTH,
            },
        );
    }

    report
}

struct Walk<'a> {
    menus: &'a HashMap<PieMenuId, &'a PieMenu>,
    /// Subtree depth of every finished menu
    depths: HashMap<PieMenuId, usize>,
    on_path: HashSet<PieMenuId>,
    violations: Vec<Violation>,
}

impl Walk<'_> {
    /// Returns the depth of the subtree rooted at `id`.
    fn visit(&mut self, id: PieMenuId) -> usize {
        if self.on_path.contains(&id) {
            self.violations.push(Violation::CycleDetected { menu_id: id });
            return 0;
        }
        if let Some(depth) = self.depths.get(&id) {
            return *depth;
        }

        // Callers only pass ids present in the map
        let Some(menu) = self.menus.get(&id).copied() else {
            return 0;
        };

        self.check_slice_count(menu);
        self.on_path.insert(id);

        let mut deepest_child = 0;
        for slice in menu.ordered_slices() {
            let Some(child) = slice.child_menu else {
                continue;
            };

            if !self.menus.contains_key(&child) {
                self.violations.push(Violation::MissingChildMenu {
                    menu_id: id,
                    slice_id: slice.id,
                    child_id: child,
                });
                continue;
            }

            deepest_child = deepest_child.max(self.visit(child));
        }

        self.on_path.remove(&id);
        let depth = 1 + deepest_child;
        self.depths.insert(id, depth);
        depth
    }

    fn check_slice_count(&mut self, menu: &PieMenu) {
        let count = menu.slices.len();
        if count > MAX_SLICES {
            self.violations.push(Violation::TooManySlices {
                menu_id: menu.id,
                count,
                max: MAX_SLICES,
            });
        } else if count < MIN_SLICES {
            self.violations.push(Violation::TooFewSlices {
                menu_id: menu.id,
                count,
                min: MIN_SLICES,
            });
        }
    }
}

/// Errors that block saving a profile record
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ValidationError {
    #[error("Profile {0} name cannot be empty")]
    EmptyProfileName(ProfileId),

    #[error("{0}")]
    Rule(#[from] RuleError),

    #[error("{0}")]
    Hierarchy(Violation),

    #[error("Slice {slice_id} in menu {menu_id} has an empty label")]
    EmptySliceLabel {
        menu_id: PieMenuId,
        slice_id: PieSliceId,
    },

    #[error("Menu {menu_id} has duplicate slice order {order}")]
    DuplicateSliceOrder { menu_id: PieMenuId, order: u32 },

    #[error("Menu id {0} is defined more than once")]
    DuplicateMenu(PieMenuId),
}

/// Validates a record for saving, collecting every error.
pub fn validate_record(record: &ProfileRecord) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if record.profile.name.trim().is_empty() {
        errors.push(ValidationError::EmptyProfileName(record.profile.id));
    }

    if let Err(rule_errors) = validate_rules(&record.profile.activation_rules) {
        errors.extend(rule_errors.into_iter().map(ValidationError::from));
    }

    let mut seen_menus = HashSet::new();
    for menu in &record.menus {
        if !seen_menus.insert(menu.id) {
            errors.push(ValidationError::DuplicateMenu(menu.id));
        }
        validate_menu_slices(menu, &mut errors);
    }

    let report = validate_hierarchy(record);
    errors.extend(
        report
            .violations
            .into_iter()
            .filter(|v| !v.is_draft_only())
            .map(ValidationError::Hierarchy),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_menu_slices(menu: &PieMenu, errors: &mut Vec<ValidationError>) {
    let mut seen_orders = HashSet::new();

    for slice in &menu.slices {
        if slice.label.trim().is_empty() {
            errors.push(ValidationError::EmptySliceLabel {
                menu_id: menu.id,
                slice_id: slice.id,
            });
        }

        if !seen_orders.insert(slice.order) {
            errors.push(ValidationError::DuplicateSliceOrder {
                menu_id: menu.id,
                order: slice.order,
            });
        }
    }
}

/// True when the record may be surfaced as the active profile.
pub fn is_presentable(record: &ProfileRecord) -> bool {
    validate_rules(&record.profile.activation_rules).is_ok()
        && validate_hierarchy(record).is_presentable()
}
