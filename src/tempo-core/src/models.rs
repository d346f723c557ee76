use serde::{Deserialize, Serialize};

/// Track metadata supplied by the host alongside a `play` request.
///
/// Keys follow the host bridge's camelCase convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub track_name: String,
    pub album_name: String,
    pub artist_name: String,
    /// File name of a cover image inside the cover cache directory.
    #[serde(default, rename = "coverFilename", skip_serializing_if = "Option::is_none")]
    pub cover_file_name: Option<String>,
}

impl TrackMetadata {
    pub fn new(
        track_name: impl Into<String>,
        album_name: impl Into<String>,
        artist_name: impl Into<String>,
    ) -> Self {
        Self {
            track_name: track_name.into(),
            album_name: album_name.into(),
            artist_name: artist_name.into(),
            cover_file_name: None,
        }
    }

    pub fn with_cover(mut self, file_name: impl Into<String>) -> Self {
        self.cover_file_name = Some(file_name.into());
        self
    }
}
