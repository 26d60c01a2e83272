//! Local store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scope used when none is configured
pub const DEFAULT_STORE_SCOPE: &str = "alpha_cart";

/// Where the cart and its pending operations are kept on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSection {
    /// Directory for cart files; the platform data directory when unset
    pub data_dir: Option<PathBuf>,

    /// File name stem for this cart, e.g. one per signed-in user
    pub scope: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            scope: DEFAULT_STORE_SCOPE.to_string(),
        }
    }
}

impl StoreSection {
    /// Configured directory, falling back to `default_dir`
    pub fn resolve_dir(&self, default_dir: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| default_dir.to_path_buf())
    }
}

impl ConfigSection for StoreSection {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![Validator::file_stem(&self.scope, "store.scope")];
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                results.push(Err(ValidationError::new(
                    "store.data_dir",
                    "must not be empty when set",
                )));
            }
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        self.scope = other.scope;
    }

    fn section_name(&self) -> &'static str {
        "store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(StoreSection::default().validate().is_ok());
    }

    #[test]
    fn test_bad_scope() {
        let config = StoreSection {
            scope: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_data_dir() {
        let config = StoreSection {
            data_dir: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_dir() {
        let fallback = Path::new("/var/lib/cartsync");
        assert_eq!(StoreSection::default().resolve_dir(fallback), fallback);

        let config = StoreSection {
            data_dir: Some(PathBuf::from("/tmp/carts")),
            ..Default::default()
        };
        assert_eq!(config.resolve_dir(fallback), PathBuf::from("/tmp/carts"));
    }

    #[test]
    fn test_merge_keeps_dir_when_unset() {
        let mut base = StoreSection {
            data_dir: Some(PathBuf::from("/tmp/carts")),
            ..Default::default()
        };
        base.merge(StoreSection {
            scope: "user_7".to_string(),
            ..Default::default()
        });
        assert_eq!(base.data_dir, Some(PathBuf::from("/tmp/carts")));
        assert_eq!(base.scope, "user_7");
    }
}
