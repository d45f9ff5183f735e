//! Weaver configuration file.
//!
//! # Responsibility
//! - Load optional defaults (`log_level`, `log_dir`, `output_dir`) from TOML.
//! - Expand `~` in configured paths.
//!
//! # Invariants
//! - An explicitly requested file must exist and parse.
//! - A missing default file means built-in defaults.

use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "basketweaver";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors while loading the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config file {}: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Values read from `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    pub output_dir: Option<String>,
}

impl Config {
    /// `<config_dir>/basketweaver/config.toml`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads `explicit` if given, else the default file if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(resolve_path)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_deref().map(resolve_path)
    }
}

/// Expands `~` and makes the path absolute against the working directory.
pub fn resolve_path(path: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
    if expanded.is_absolute() {
        return expanded;
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_path, Config};
    use std::fs;

    #[test]
    fn parses_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "log_level = \"warn\"\nlog_dir = \"/var/log/basket\"\noutput_dir = \"/tmp/out\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert_eq!(config.log_dir().unwrap(), std::path::PathBuf::from("/var/log/basket"));
        assert_eq!(config.output_dir().unwrap(), std::path::PathBuf::from("/tmp/out"));
    }

    #[test]
    fn explicit_missing_or_unknown_keys_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());

        let path = dir.path().join("bad.toml");
        fs::write(&path, "colour = \"red\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn relative_paths_become_absolute() {
        assert!(resolve_path("out").is_absolute());
        assert!(!resolve_path("~/logs").to_string_lossy().starts_with('~'));
    }
}
