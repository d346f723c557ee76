use crate::paths::{AppDirs, DirsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";
const SUPPORTED_VERSION: u32 = 1;

/// Contents of `config.toml`. Every section and key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub config_version: u32,
    pub logging: LoggingConfig,
    pub playback: PlaybackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: SUPPORTED_VERSION,
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Rolled log files kept on disk, oldest pruned first.
    pub max_log_files: usize,
    /// Mirror log lines to stderr.
    pub stdout: bool,
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            max_log_files: 7,
            stdout: true,
            file_name: None,
        }
    }
}

/// Tunables for the playback session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Cadence of the position sampling timer.
    pub position_interval_ms: u64,
    /// Tolerance window applied on both sides of a fractional seek.
    pub seek_tolerance_ms: u64,
    /// Where cover art files are resolved from. Defaults to the app cache dir.
    pub cover_dir: Option<PathBuf>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 100,
            seek_tolerance_ms: 100,
            cover_dir: None,
        }
    }
}

impl PlaybackConfig {
    /// Never shorter than 1 ms, even when validation was skipped.
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(1))
    }

    pub fn seek_tolerance(&self) -> Duration {
        Duration::from_millis(self.seek_tolerance_ms)
    }

    pub fn cover_dir<'a>(&'a self, dirs: &'a AppDirs) -> &'a Path {
        self.cover_dir.as_deref().unwrap_or_else(|| dirs.cache_dir())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    /// Renders the level as an `EnvFilter` directive.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(directive)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Validation(#[source] ValidationError),
    #[error(transparent)]
    Directories(#[from] DirsError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("config_version {found} is not supported (this build reads version {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("playback.position_interval_ms must be greater than zero")]
    ZeroPositionInterval,
}

impl Config {
    /// Reads `config.toml` from the config dir, falling back to defaults when
    /// the file does not exist yet. Creates the app directories on the way.
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if path.is_file() {
            return Self::load_from(&path);
        }
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = toml::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join(CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Config { config_version, .. } if *config_version != SUPPORTED_VERSION => {
                Err(ValidationError::UnsupportedVersion {
                    found: *config_version,
                    expected: SUPPORTED_VERSION,
                })
            }
            Config { playback, .. } if playback.position_interval_ms == 0 => {
                Err(ValidationError::ZeroPositionInterval)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_sample_every_100ms() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.playback.position_interval(), Duration::from_millis(100));
        assert_eq!(config.playback.seek_tolerance(), Duration::from_millis(100));
        assert_eq!(config.logging.level.to_string(), "info");
        assert_eq!(config.logging.max_log_files, 7);
    }

    #[test]
    fn future_version_is_rejected() {
        let config = Config {
            config_version: SUPPORTED_VERSION + 1,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnsupportedVersion {
                found: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let (_dir, path) = write_config("[playback]\nposition_interval_ms = 0\n");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::ZeroPositionInterval)
        ));
    }

    #[test]
    fn unvalidated_zero_interval_is_clamped() {
        let playback = PlaybackConfig {
            position_interval_ms: 0,
            ..PlaybackConfig::default()
        };
        assert_eq!(playback.position_interval(), Duration::from_millis(1));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let (_dir, path) =
            write_config("[playback]\nseek_tolerance_ms = 250\n\n[logging]\nlevel = \"debug\"\n");

        let config = Config::load_from(&path).expect("config should load");
        assert_eq!(config.playback.seek_tolerance_ms, 250);
        assert_eq!(config.playback.position_interval_ms, 100);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.stdout);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let (_dir, path) = write_config("playback = 3");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = AppDirs::rooted(dir.path());
        let config = Config::load_or_default(&dirs).unwrap();
        assert_eq!(config, Config::default());
        assert!(dirs.cache_dir().is_dir());
    }

    #[test]
    fn cover_dir_defaults_to_cache() {
        let dirs = AppDirs::rooted("/srv/tempo");
        let mut playback = PlaybackConfig::default();
        assert_eq!(playback.cover_dir(&dirs), dirs.cache_dir());

        playback.cover_dir = Some(PathBuf::from("/covers"));
        assert_eq!(playback.cover_dir(&dirs), Path::new("/covers"));
    }
}
