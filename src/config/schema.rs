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

//! On-disk profiles document
//!
//! Schema v2 (current) stores activation rules as the tagged union:
//!
//! ```json
//! {"schemaVersion": 2, "profiles": [...], "pinnedProfileId": null}
//! ```
//!
//! Schema v1 documents (no `schemaVersion`, or `1`) store each rule as a
//! `{mode, value, negate}` triple. They are imported through
//! [`crate::core::encoding`] and are always written back as v2. A rule that
//! cannot be decoded is dropped with a warning. A profile that loses every
//! rule this way is imported disabled, so it never turns into a fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::ConfigError;
use crate::core::encoding::{decode_rule, encode_rule, StoredRule};
use crate::core::{ActivationRule, PieMenu, PieMenuId, Profile, ProfileId, ProfileRecord};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 2;

const LEGACY_SCHEMA_VERSION: u32 = 1;

/// Everything persisted about profiles
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub profiles: Vec<ProfileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_profile_id: Option<ProfileId>,
}

impl Default for ProfileDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            profiles: Vec::new(),
            pinned_profile_id: None,
        }
    }
}

impl ProfileDocument {
    pub fn new(profiles: Vec<ProfileRecord>, pinned_profile_id: Option<ProfileId>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            profiles,
            pinned_profile_id,
        }
    }

    /// Parses a document of any supported schema version.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;

        let version = match value.get("schemaVersion") {
            None | Some(Value::Null) => LEGACY_SCHEMA_VERSION,
            Some(raw) => raw
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(ConfigError::UnsupportedSchema(0))?,
        };

        match version {
            SCHEMA_VERSION => Ok(serde_json::from_value(value)?),
            LEGACY_SCHEMA_VERSION => Ok(serde_json::from_value::<LegacyDocument>(value)?.upgrade()),
            other => Err(ConfigError::UnsupportedSchema(other)),
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Renders the document in the v1 layout, for older readers.
    pub fn to_legacy_json(&self) -> Result<String, ConfigError> {
        let legacy = LegacyDocument::from(self);
        Ok(serde_json::to_string_pretty(&legacy)?)
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProfile {
    id: ProfileId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global_hotkey: Option<String>,
    #[serde(default)]
    activation_rules: Vec<StoredRule>,
    root_menu: PieMenuId,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    profile: LegacyProfile,
    #[serde(default)]
    menus: Vec<PieMenu>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// v1 kept the pin under `activeProfileId`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    #[serde(default)]
    profiles: Vec<LegacyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_profile_id: Option<ProfileId>,
}

impl LegacyDocument {
    fn upgrade(self) -> ProfileDocument {
        let profiles = self.profiles.into_iter().map(LegacyRecord::upgrade).collect();
        ProfileDocument::new(profiles, self.active_profile_id)
    }
}

impl LegacyRecord {
    fn upgrade(self) -> ProfileRecord {
        let LegacyProfile {
            id,
            name,
            description,
            enabled,
            global_hotkey,
            activation_rules,
            root_menu,
        } = self.profile;

        let stored_count = activation_rules.len();
        let activation_rules: Vec<ActivationRule> = activation_rules
            .iter()
            .enumerate()
            .filter_map(|(index, stored)| match decode_rule(stored) {
                Ok(rule) => Some(rule),
                Err(source) => {
                    let error = ConfigError::LegacyRule {
                        profile: id,
                        index,
                        source,
                    };
                    warn!(%error, "Dropping undecodable v1 rule");
                    None
                }
            })
            .collect();

        let enabled = if stored_count > 0 && activation_rules.is_empty() {
            warn!(profile = %id, "Every v1 rule was dropped, importing profile disabled");
            false
        } else {
            enabled
        };

        ProfileRecord {
            profile: Profile {
                id,
                name,
                description,
                enabled,
                global_hotkey,
                activation_rules,
                root_menu,
            },
            menus: self.menus,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&ProfileDocument> for LegacyDocument {
    fn from(document: &ProfileDocument) -> Self {
        let profiles = document
            .profiles
            .iter()
            .map(|record| LegacyRecord {
                profile: LegacyProfile {
                    id: record.profile.id,
                    name: record.profile.name.clone(),
                    description: record.profile.description.clone(),
                    enabled: record.profile.enabled,
                    global_hotkey: record.profile.global_hotkey.clone(),
                    activation_rules: record.profile.activation_rules.iter().map(encode_rule).collect(),
                    root_menu: record.profile.root_menu,
                },
                menus: record.menus.clone(),
                created_at: record.created_at.clone(),
                updated_at: record.updated_at.clone(),
            })
            .collect();

        Self {
            profiles,
            active_profile_id: document.pinned_profile_id,
        }
    }
}
