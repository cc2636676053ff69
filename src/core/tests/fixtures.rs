//! Shared builders for core tests

use crate::core::types::{ActionId, ActivationRule, PieMenu, PieSlice, Profile, ProfileRecord};

/// Menu with `count` action slices.
pub fn menu_with_slices(title: &str, count: usize) -> PieMenu {
    let mut menu = PieMenu::new(title);
    for order in 0..count {
        menu.slices
            .push(PieSlice::action(format!("{} {}", title, order), ActionId::new(), order as u32));
    }
    menu
}

/// Presentable single-menu profile with the given rules.
pub fn profile_with_rules(name: &str, rules: Vec<ActivationRule>) -> ProfileRecord {
    let root = menu_with_slices(name, 4);
    let mut profile = Profile::new(name, root.id);
    profile.activation_rules = rules;
    ProfileRecord::new(profile, vec![root])
}
