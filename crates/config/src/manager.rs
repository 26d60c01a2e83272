// crates/config/src/manager.rs
//! Locating, layering and updating the client config
//!
//! The effective config is built in three layers: built-in defaults, the
//! `cartsync.toml` file, then `CARTSYNC_<SECTION>_<FIELD>` environment
//! variables. Only the first two are ever written back.

use crate::{persistence, Config, ConfigError, ConfigResult, ValidationError, KEYS};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `CARTSYNC_SYNC_MAX_ATTEMPTS`
pub const ENV_PREFIX: &str = "CARTSYNC";

const FILE_NAME: &str = "cartsync.toml";

/// Handle on one `cartsync.toml`
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory, e.g. `~/.config/cartsync/` on Linux
    pub fn new() -> ConfigResult<Self> {
        Ok(Self::with_directory(project_dirs()?.config_dir()))
    }

    /// Uses `cartsync.toml` inside `dir`
    pub fn with_directory(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(FILE_NAME),
        }
    }

    /// Platform data directory, used for carts unless `store.data_dir` is set
    pub fn default_data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Defaults overlaid with the file, if there is one
    pub fn load(&self) -> ConfigResult<Config> {
        Ok(persistence::read(&self.path)?.unwrap_or_default())
    }

    /// What the client actually runs with: the file plus environment overrides
    pub fn load_effective(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        let applied = overlay_env(&mut config, |name| std::env::var(name).ok());
        if applied > 0 {
            log::debug!("{} config value(s) taken from the environment", applied);
        }
        Ok(config)
    }

    /// Validates and writes `config`
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        persistence::write(&self.path, config)
    }

    /// Changes one key in the file and returns the updated config
    ///
    /// Nothing is written if the value does not parse or leaves the config
    /// invalid.
    pub fn set(&self, key: &str, value: &str) -> ConfigResult<Config> {
        let mut config = self.load()?;
        config.set(key, value)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Writes a default file unless one exists; returns true if it did
    pub fn init(&self) -> ConfigResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Config::default())?;
        Ok(true)
    }

    /// Out-of-range values in the file, with environment overrides ignored
    pub fn problems(&self) -> ConfigResult<Vec<ValidationError>> {
        Ok(self.load()?.validate().err().unwrap_or_default())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("", "", "cartsync").ok_or(ConfigError::NoHomeDirectory)
}

/// Environment variable for a `section.field` key
pub(crate) fn env_var_name(key: &str) -> String {
    format!("{}_{}", ENV_PREFIX, key.replace('.', "_").to_ascii_uppercase())
}

/// Applies every override `lookup` knows about; returns how many took effect
fn overlay_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> usize {
    let mut applied = 0;
    for key in KEYS {
        let name = env_var_name(key);
        let Some(value) = lookup(&name) else {
            continue;
        };
        match config.set(key, &value) {
            Ok(()) => applied += 1,
            Err(e) => log::warn!("Ignoring {}: {}", name, e),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_directory(dir.path());
        (dir, manager)
    }

    #[test]
    fn test_file_name() {
        let (dir, manager) = manager();
        assert_eq!(manager.config_path(), dir.path().join("cartsync.toml"));
    }

    #[test]
    fn test_load_without_file_is_default() {
        let (_dir, manager) = manager();
        assert_eq!(manager.load().unwrap(), Config::default());
        assert!(!manager.config_path().exists());
    }

    #[test]
    fn test_init_only_once() {
        let (_dir, manager) = manager();
        assert!(manager.init().unwrap());
        manager.set("store.scope", "user_7").unwrap();

        assert!(!manager.init().unwrap());
        assert_eq!(manager.load().unwrap().store.scope, "user_7");
    }

    #[test]
    fn test_set_writes_valid_values_only() {
        let (_dir, manager) = manager();

        let updated = manager.set("sync.max_batch_size", "5").unwrap();
        assert_eq!(updated.sync.max_batch_size, 5);
        assert_eq!(manager.load().unwrap().sync.max_batch_size, 5);

        assert!(matches!(
            manager.set("sync.max_batch_size", "0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            manager.set("sync.max_batch_size", "five"),
            Err(ConfigError::BadValue { .. })
        ));
        assert_eq!(manager.load().unwrap().sync.max_batch_size, 5);
    }

    #[test]
    fn test_problems_reported_from_file() {
        let (_dir, manager) = manager();
        std::fs::write(
            manager.config_path(),
            "[sync]\nmax_attempts = 0\n\n[backend]\nbase_url = \"ftp://x\"\n",
        )
        .unwrap();

        let fields: Vec<_> = manager
            .problems()
            .unwrap()
            .into_iter()
            .map(|p| p.field)
            .collect();
        assert_eq!(fields, vec!["sync.max_attempts", "backend.base_url"]);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("sync.max_attempts"), "CARTSYNC_SYNC_MAX_ATTEMPTS");
        assert_eq!(
            env_var_name("backend.notification_idle_ms"),
            "CARTSYNC_BACKEND_NOTIFICATION_IDLE_MS"
        );
    }

    #[test]
    fn test_overlay_env_skips_bad_values() {
        let mut config = Config::default();
        let applied = overlay_env(&mut config, |name| match name {
            "CARTSYNC_SYNC_MAX_ATTEMPTS" => Some("7".to_string()),
            "CARTSYNC_BACKEND_BASE_URL" => Some("https://shop.example/api".to_string()),
            "CARTSYNC_SYNC_JITTER" => Some("not a number".to_string()),
            _ => None,
        });

        assert_eq!(applied, 2);
        assert_eq!(config.sync.max_attempts, 7);
        assert_eq!(config.backend.base_url, "https://shop.example/api");
        assert_eq!(config.sync.jitter, Config::default().sync.jitter);
    }

    #[test]
    fn test_effective_config_reads_process_env() {
        let (_dir, manager) = manager();
        manager.init().unwrap();

        std::env::set_var("CARTSYNC_STORE_SCOPE", "env_scope");
        let effective = manager.load_effective().unwrap();
        std::env::remove_var("CARTSYNC_STORE_SCOPE");

        assert_eq!(effective.store.scope, "env_scope");
        assert_eq!(manager.load().unwrap().store.scope, "alpha_cart");
    }
}
