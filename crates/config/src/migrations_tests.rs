// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use similar_asserts::assert_eq;

fn parse(body: &str) -> Table {
    body.parse::<Table>().unwrap()
}

#[test]
fn repos_section_is_renamed() {
    let mut config = parse("[repos.backend]\npath = \"backend\"\ntopic_id = 100\n");
    let applied = migrate_config(&mut config);
    assert_eq!(applied, vec!["repos-to-folders"]);
    assert!(!config.contains_key("repos"));
    assert_eq!(
        config["folders"]["backend"]["topic_id"].as_integer(),
        Some(100)
    );
}

#[test]
fn repos_dropped_when_folders_exist() {
    let mut config = parse(
        "[repos.old]\npath = \"old\"\n\n[folders.backend]\npath = \"backend\"\n",
    );
    let applied = migrate_config(&mut config);
    assert_eq!(applied, vec!["repos-to-folders"]);
    assert!(!config.contains_key("repos"));
    assert!(config["folders"].get("old").is_none());
    assert!(config["folders"].get("backend").is_some());
}

#[test]
fn legacy_telegram_fields_move() {
    let mut config = parse(
        "[workspace]\nname = \"demo\"\nbot_token = \"123:abc\"\ntelegram_group_id = -100\n",
    );
    let applied = migrate_config(&mut config);
    assert_eq!(applied, vec!["legacy-telegram"]);
    let workspace = config["workspace"].as_table().unwrap();
    assert!(!workspace.contains_key("bot_token"));
    assert!(!workspace.contains_key("telegram_group_id"));
    assert_eq!(config["telegram"]["bot_token"].as_str(), Some("123:abc"));
    assert_eq!(config["telegram"]["chat_id"].as_integer(), Some(-100));
}

#[test]
fn legacy_telegram_does_not_overwrite_existing() {
    let mut config = parse(
        "[workspace]\nbot_token = \"old\"\ntelegram_group_id = 1\n\n[telegram]\nbot_token = \"new\"\nchat_id = 2\n",
    );
    migrate_config(&mut config);
    assert_eq!(config["telegram"]["bot_token"].as_str(), Some("new"));
    assert_eq!(config["telegram"]["chat_id"].as_integer(), Some(2));
    assert!(!config["workspace"]
        .as_table()
        .unwrap()
        .contains_key("bot_token"));
}

#[test]
fn migrations_are_idempotent() {
    let mut config = parse(
        "[workspace]\nname = \"demo\"\nbot_token = \"t\"\ntelegram_group_id = 9\n\n[repos.a]\npath = \"a\"\n",
    );
    let first = migrate_config(&mut config);
    assert_eq!(first.len(), 2);
    let snapshot = config.clone();
    let second = migrate_config(&mut config);
    assert!(second.is_empty());
    assert_eq!(config, snapshot);
}

#[test]
fn clean_config_is_untouched() {
    let mut config = parse("[workspace]\nname = \"demo\"\n\n[folders.a]\npath = \"a\"\n");
    let snapshot = config.clone();
    assert!(migrate_config(&mut config).is_empty());
    assert_eq!(config, snapshot);
}

#[test]
fn file_migration_writes_backup_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workspace.toml");
    std::fs::write(
        &path,
        "[workspace]\nname = \"demo\"\nbot_token = \"t\"\ntelegram_group_id = 9\n",
    )
    .unwrap();

    let applied = migrate_config_file(&path).unwrap();
    assert_eq!(applied, vec!["legacy-telegram"]);
    let backup = path.with_extension("toml.bak");
    assert!(backup.exists());
    assert!(std::fs::read_to_string(&backup)
        .unwrap()
        .contains("telegram_group_id"));

    // Second run: no changes, no fresh backup
    std::fs::remove_file(&backup).unwrap();
    let migrated = std::fs::read_to_string(&path).unwrap();
    let applied = migrate_config_file(&path).unwrap();
    assert!(applied.is_empty());
    assert!(!backup.exists());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), migrated);
}

#[test]
fn file_migration_missing_file_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let applied = migrate_config_file(&dir.path().join("nope.toml")).unwrap();
    assert!(applied.is_empty());
}

#[test]
fn migrated_file_loads_as_workspace_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join(crate::workspace::WORKSPACE_CONFIG_DIR);
    std::fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join(crate::workspace::WORKSPACE_CONFIG_FILE);
    std::fs::write(
        &path,
        "[workspace]\nname = \"demo\"\nbot_token = \"t\"\ntelegram_group_id = 9\n\n[repos.backend]\npath = \"backend\"\ntopic_id = 100\n",
    )
    .unwrap();

    migrate_config_file(&path).unwrap();
    let config = crate::workspace::load_workspace_config(dir.path()).unwrap();
    assert_eq!(config.folders["backend"].topic_id, Some(100));
    let telegram = config.transport_config("telegram").unwrap();
    assert_eq!(telegram["chat_id"].as_integer(), Some(9));
}
