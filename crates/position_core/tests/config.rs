use position_core::{Backend, ConfigError, Item, PositionService, Repository, StorageConfig};
use std::fs;

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config, StorageConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("position").join("config.toml");
    let config = StorageConfig {
        backend: Backend::File,
        data_dir: Some(dir.path().join("data")),
    };

    config.save(&path).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("backend = \"file\""));
    assert_eq!(StorageConfig::load(&path).unwrap(), config);
}

#[test]
fn invalid_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "backend = \"cloud\"\n").unwrap();

    assert!(matches!(
        StorageConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn open_repository_builds_sql_backend_in_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: Backend::Sql,
        data_dir: Some(dir.path().join("data")),
    };

    let repo = config.open_repository().unwrap();
    repo.create_item(&Item::new("harper")).unwrap();
    assert!(dir.path().join("data").join("position.db").is_file());
}

#[test]
fn open_repository_builds_file_backend_at_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: Backend::File,
        data_dir: Some(dir.path().join("data")),
    };

    let repo = config.open_repository().unwrap();
    repo.create_item(&Item::new("harper")).unwrap();
    assert!(dir.path().join("data").join("_items.yaml").is_file());
    assert!(dir.path().join("data").join("harper").is_dir());
}

#[test]
fn configured_repository_drives_position_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: Backend::File,
        data_dir: Some(dir.path().to_path_buf()),
    };

    let service = PositionService::new(config.open_repository().unwrap());
    service
        .record_position("harper", 41.8781, -87.6298, None, None)
        .unwrap();
    service
        .record_position("harper", 41.8781, -87.6298, None, None)
        .unwrap();
    assert_eq!(service.timeline("harper").unwrap().len(), 1);
}
