use tempo_media::MediaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The `play` url could not be parsed.
    #[error("invalid source url: {0}")]
    InvalidSource(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid arguments for {method}: {message}")]
    InvalidArguments { method: String, message: String },
    /// The handle reported a failed item.
    #[error("Playback failed")]
    PlaybackFailed,
    /// The handle reported a status that could not be classified.
    #[error("Unknown error")]
    UnknownPlaybackStatus,
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl SessionError {
    /// Numeric code reported to the host. Asynchronous playback errors share
    /// code 0, which is what hosts already match on.
    pub fn code(&self) -> i32 {
        match self {
            SessionError::PlaybackFailed | SessionError::UnknownPlaybackStatus => 0,
            SessionError::InvalidSource(_) => 1,
            SessionError::UnknownCommand(_) => 2,
            SessionError::InvalidArguments { .. } => 3,
            SessionError::Media(_) => 4,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
