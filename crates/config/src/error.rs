// crates/config/src/error.rs
//! Config errors

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading, changing or writing `cartsync.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but holds nothing; an empty file is never taken as defaults
    #[error("{path} is empty")]
    Empty { path: PathBuf },

    #[error("{path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot render config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// One or more values are out of range; nothing was written
    #[error("{}", describe(.0))]
    Invalid(Vec<ValidationError>),

    /// A value given for a key does not parse as that key's type
    #[error("'{value}' is not a valid {expected} for {key}")]
    BadValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    /// No home directory to derive the platform config and data paths from
    #[error("Cannot locate the user's home directory")]
    NoHomeDirectory,
}

fn describe(problems: &[ValidationError]) -> String {
    let joined = problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("Invalid config: {}", joined)
}

/// One out-of-range value, named by its `section.field` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    /// The rejected value, when it helps to show it
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} (is {})", self.field, self.message, value),
            None => write!(f, "{} {}", self.field, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}
