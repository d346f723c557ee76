use crate::{APP_AUTHOR, APP_NAME, APP_QUALIFIER};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where Tempo keeps its config file, cover art cache and rolled logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config_dir: PathBuf,
    cache_dir: PathBuf,
    log_dir: PathBuf,
}

impl AppDirs {
    /// Platform locations, e.g. `~/.config/tempo` and `~/.cache/tempo` on Linux.
    pub fn discover() -> Result<Self, DirsError> {
        ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME)
            .map(|project| Self {
                config_dir: project.config_dir().to_owned(),
                cache_dir: project.cache_dir().to_owned(),
                log_dir: project.data_local_dir().join("logs"),
            })
            .ok_or(DirsError::NoHomeDirectory)
    }

    /// Lays every directory out under a single root, for portable installs and tests.
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            log_dir: root.join("logs"),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.config_dir, &self.cache_dir, &self.log_dir]
    }

    pub fn ensure_exists(&self) -> Result<(), DirsError> {
        self.all().into_iter().try_for_each(|dir| {
            std::fs::create_dir_all(dir).map_err(|source| DirsError::CreateDirectory {
                path: dir.to_owned(),
                source,
            })
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Cover art handed over by the host is looked up here.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, Error)]
pub enum DirsError {
    #[error("no home directory to place tempo files under")]
    NoHomeDirectory,
    #[error("cannot create {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}
