//! Cover art lookup and decoding.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cover file name {0:?} must be a plain file name")]
    InvalidName(String),
    #[error("failed to read cover at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode cover {name}: {source}")]
    Decode {
        name: String,
        source: image::ImageError,
    },
}

/// Resolves a cover file name to encoded image bytes.
pub trait AssetStore: Send + Sync {
    fn load(&self, file_name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Serves files from a single directory (the app cache dir by default).
#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirectoryAssetStore {
    fn load(&self, file_name: &str) -> Result<Vec<u8>, AssetError> {
        let mut components = Path::new(file_name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            return Err(AssetError::InvalidName(file_name.to_string()));
        }

        let path = self.root.join(file_name);
        fs::read(&path).map_err(|source| AssetError::Read { path, source })
    }
}

/// Decoded cover image, RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct Artwork {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<[u8]>,
}

impl std::fmt::Debug for Artwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artwork")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Artwork {
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            rgba: image.into_raw().into(),
        })
    }
}

pub fn load_artwork(store: &dyn AssetStore, file_name: &str) -> Result<Artwork, AssetError> {
    let bytes = store.load(file_name)?;
    Artwork::decode(&bytes).map_err(|source| AssetError::Decode {
        name: file_name.to_string(),
        source,
    })
}
