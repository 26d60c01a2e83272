//! Damaged, partial and hand-edited config files

use cartsync_config::{Config, ConfigError, ConfigManager};
use std::fs;
use tempfile::TempDir;

fn without_file() -> (TempDir, ConfigManager) {
    let dir = TempDir::new().expect("temp dir");
    let manager = ConfigManager::with_directory(dir.path());
    (dir, manager)
}

fn manager_with(contents: &str) -> (TempDir, ConfigManager) {
    let (dir, manager) = without_file();
    fs::write(manager.config_path(), contents).expect("write config");
    (dir, manager)
}

#[test]
fn test_broken_toml_is_reported_not_replaced() {
    let (_dir, manager) = manager_with("[sync\nmax_attempts = ");

    assert!(matches!(manager.load(), Err(ConfigError::Parse { .. })));
    assert!(matches!(
        manager.set("sync.max_attempts", "3"),
        Err(ConfigError::Parse { .. })
    ));
    assert!(!manager.init().expect("file exists"));
    assert_eq!(
        fs::read_to_string(manager.config_path()).expect("read"),
        "[sync\nmax_attempts = "
    );
}

#[test]
fn test_blank_file_is_an_error() {
    let (_dir, manager) = manager_with("\n   \n");
    let err = manager.load().unwrap_err();
    assert!(matches!(err, ConfigError::Empty { .. }));
    assert!(err.to_string().ends_with("is empty"));
}

#[test]
fn test_only_backend_given() -> Result<(), ConfigError> {
    let (_dir, manager) = manager_with("[backend]\nbase_url = \"https://shop.example/api\"\n");

    let config = manager.load()?;
    assert_eq!(config.backend.base_url, "https://shop.example/api");
    assert_eq!(config.backend.health_path, "health");
    assert_eq!(config.sync, Config::default().sync);
    assert_eq!(config.store, Config::default().store);
    Ok(())
}

#[test]
fn test_keys_from_other_builds_are_ignored() -> Result<(), ConfigError> {
    let (_dir, manager) = manager_with("version = 9\n\n[sync]\nmax_attempts = 4\nretired_option = true\n");

    let config = manager.load()?;
    assert_eq!(config.sync.max_attempts, 4);
    assert_eq!(config.version, 9);
    Ok(())
}

#[test]
fn test_out_of_range_file_loads_but_is_flagged() -> Result<(), ConfigError> {
    let (_dir, manager) = manager_with("[sync]\nmax_batch_size = 0\n\n[store]\nscope = \"a/b\"\n");

    assert_eq!(manager.load()?.sync.max_batch_size, 0);
    let fields: Vec<_> = manager.problems()?.into_iter().map(|p| p.field).collect();
    assert_eq!(fields, vec!["sync.max_batch_size", "store.scope"]);

    // fixing one value through `set` is refused while the other stays broken
    assert!(matches!(
        manager.set("sync.max_batch_size", "10"),
        Err(ConfigError::Invalid(_))
    ));
    Ok(())
}

#[test]
fn test_unknown_key_and_bad_types() {
    let (_dir, manager) = without_file();

    assert!(matches!(
        manager.set("player.volume", "3"),
        Err(ConfigError::UnknownKey(_))
    ));
    assert!(matches!(
        manager.set("sync.multiplier", "double"),
        Err(ConfigError::BadValue {
            expected: "number",
            ..
        })
    ));
    assert!(!manager.config_path().exists());
}

#[test]
fn test_file_removed_after_init() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = without_file();
    assert!(manager.init()?);
    fs::remove_file(manager.config_path())?;

    assert_eq!(manager.load()?, Config::default());
    Ok(())
}

#[test]
fn test_repeated_writes_keep_last_value() -> Result<(), ConfigError> {
    let (_dir, manager) = without_file();
    for attempts in 1..=50u32 {
        manager.set("sync.max_attempts", &attempts.to_string())?;
    }
    assert_eq!(manager.load()?.sync.max_attempts, 50);
    Ok(())
}

#[test]
fn test_readers_on_other_threads() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(dir.path());
    manager.init()?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || (0..10).all(|_| manager.load().is_ok()))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().map_err(|_| "reader panicked")?);
    }
    Ok(())
}
