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

use std::fs;
use tempfile::TempDir;

use crate::config::{ProfileDocument, ProfileRepository, ProfileTransaction, SCHEMA_VERSION};
use crate::core::{ActionId, ActivationRule, PieMenu, PieSlice, Profile, ProfileRecord, TextPattern};

fn sample_record(name: &str) -> ProfileRecord {
    let mut root = PieMenu::new("Main");
    root.slices.push(PieSlice::action("Copy", ActionId::new(), 0));
    root.slices.push(PieSlice::action("Paste", ActionId::new(), 1));

    let mut profile = Profile::new(name, root.id);
    profile.activation_rules = vec![ActivationRule::process_name(TextPattern::literal("chrome.exe"))];
    ProfileRecord::new(profile, vec![root])
}

fn repository(dir: &TempDir) -> ProfileRepository {
    ProfileRepository::new(dir.path().join("profiles.json")).unwrap()
}

#[test]
fn test_missing_file_loads_empty() {
    let dir = TempDir::new().unwrap();
    let document = repository(&dir).load().unwrap();

    assert!(document.profiles.is_empty());
    assert_eq!(document.schema_version, SCHEMA_VERSION);
}

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);
    let record = sample_record("Browser");
    let document = ProfileDocument::new(vec![record.clone()], Some(record.id()));

    let backup = repository.save(&document).unwrap();
    assert!(backup.is_none(), "first save has nothing to back up");

    let loaded = repository.load().unwrap();
    assert_eq!(loaded, document);
}

#[test]
fn test_second_save_creates_backup() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);

    repository.save(&ProfileDocument::new(vec![sample_record("One")], None)).unwrap();
    let first = fs::read_to_string(repository.path()).unwrap();

    let backup = repository
        .save(&ProfileDocument::new(vec![sample_record("Two")], None))
        .unwrap()
        .unwrap();

    assert_eq!(fs::read_to_string(&backup).unwrap(), first);
    assert_eq!(repository.list_backups().unwrap(), vec![backup]);
}

#[test]
fn test_backups_in_same_second_do_not_overwrite() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);
    repository.save(&ProfileDocument::default()).unwrap();

    for _ in 0..3 {
        repository.save(&ProfileDocument::default()).unwrap();
    }

    assert_eq!(repository.list_backups().unwrap().len(), 3);
}

#[test]
fn test_backups_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir).with_backups(false);

    repository.save(&ProfileDocument::default()).unwrap();
    assert!(repository.save(&ProfileDocument::default()).unwrap().is_none());
    assert!(repository.list_backups().unwrap().is_empty());
}

#[test]
fn test_backup_name_is_timestamped() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);
    repository.save(&ProfileDocument::default()).unwrap();

    let backup = repository.save(&ProfileDocument::default()).unwrap().unwrap();
    let name = backup.file_name().unwrap().to_str().unwrap().to_string();

    // profiles.json.YYYY-MM-DD_HHMMSS
    let stamp = name.strip_prefix("profiles.json.").unwrap();
    assert_eq!(stamp.len(), 17);
    assert_eq!(&stamp[4..5], "-");
    assert_eq!(&stamp[10..11], "_");
}

#[test]
fn test_transaction_backs_up_before_commit() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);
    repository.save(&ProfileDocument::default()).unwrap();
    let original = fs::read_to_string(repository.path()).unwrap();

    let tx = ProfileTransaction::begin(&repository).unwrap();
    let backup = tx.backup_path().cloned().unwrap();
    assert_eq!(fs::read_to_string(&backup).unwrap(), original);

    assert_eq!(tx.commit("{}\n").unwrap(), Some(backup));
    assert_eq!(fs::read_to_string(repository.path()).unwrap(), "{}\n");
}

#[test]
fn test_first_transaction_has_no_backup() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);

    let tx = ProfileTransaction::begin(&repository).unwrap();
    assert!(tx.backup_path().is_none());
    assert_eq!(tx.commit("{}\n").unwrap(), None);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let repository = ProfileRepository::new(dir.path().join("nested/deeper/profiles.json")).unwrap();

    repository.save(&ProfileDocument::default()).unwrap();
    assert!(repository.path().exists());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let repository = repository(&dir);
    fs::write(repository.path(), "{ not json").unwrap();

    assert!(repository.load().is_err());
}
