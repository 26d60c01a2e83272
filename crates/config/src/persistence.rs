// crates/config/src/persistence.rs
//! Reading and writing `cartsync.toml`
//!
//! Files written by an older build are read with the missing keys defaulted
//! and their version bumped in memory; the file itself is only rewritten when
//! the user saves.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const HEADER: &str = "# cartsync client settings\n# Every key can be overridden with CARTSYNC_<SECTION>_<FIELD>.\n\n";

/// Reads the config at `path`, or `None` if there is no file
pub(crate) fn read(path: &Path) -> ConfigResult<Option<Config>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if contents.trim().is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }

    let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match config.version {
        v if v > CONFIG_VERSION => log::warn!(
            "{} was written by a newer cartsync (format {}); unknown keys are ignored",
            path.display(),
            v
        ),
        v if v < CONFIG_VERSION => {
            log::info!("Reading format {} config as format {}", v, CONFIG_VERSION);
            config.version = CONFIG_VERSION;
        }
        _ => {}
    }

    // out-of-range values stay so `config validate` can point at them
    if let Err(problems) = config.validate() {
        for problem in &problems {
            log::warn!("{}: {}", path.display(), problem);
        }
    }

    Ok(Some(config))
}

/// Validates `config` and replaces the file at `path` in one rename
pub(crate) fn write(path: &Path, config: &Config) -> ConfigResult<()> {
    config.validate().map_err(ConfigError::Invalid)?;

    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_error)?;

    let body = toml::to_string_pretty(config)?;
    let mut staging = NamedTempFile::new_in(dir).map_err(write_error)?;
    staging
        .write_all(HEADER.as_bytes())
        .and_then(|_| staging.write_all(body.as_bytes()))
        .and_then(|_| staging.flush())
        .map_err(write_error)?;
    staging.persist(path).map_err(|e| write_error(e.error))?;

    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cartsync.toml");
        (dir, path)
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let (_dir, path) = config_file();
        assert!(read(&path).unwrap().is_none());
    }

    #[test]
    fn test_written_file_reads_back() {
        let (_dir, path) = config_file();
        let mut config = Config::default();
        config.sync.max_attempts = 8;
        config.store.scope = "user_42".to_string();

        write(&path, &config).unwrap();
        assert_eq!(read(&path).unwrap(), Some(config));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("# cartsync client settings"));
    }

    #[test]
    fn test_write_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cartsync.toml");
        write(&path, &Config::default()).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_invalid_config_is_not_written() {
        let (_dir, path) = config_file();
        let mut config = Config::default();
        config.sync.jitter = 3.0;
        config.backend.base_url = "shop".to_string();

        match write(&path, &config) {
            Err(ConfigError::Invalid(problems)) => assert_eq!(problems.len(), 2),
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_unparsable_and_empty_files() {
        let (_dir, path) = config_file();

        fs::write(&path, "[sync\nmax_attempts = ").unwrap();
        assert!(matches!(read(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, " \n\t").unwrap();
        assert!(matches!(read(&path), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_old_format_is_read_with_defaults() {
        let (_dir, path) = config_file();
        fs::write(&path, "version = 0\n[sync]\nmax_attempts = 3\n").unwrap();

        let config = read(&path).unwrap().unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.backend, crate::BackendSection::default());
    }
}
