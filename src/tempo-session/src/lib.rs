mod artwork;
mod command;
mod error;
mod events;
mod remote;
mod scheduler;
mod session;
mod surface;

pub use artwork::{load_artwork, AssetError, AssetStore, Artwork, DirectoryAssetStore};
pub use command::{platform_reply, HostCommand, MethodCall, PlayRequest};
pub use error::{SessionError, SessionResult};
pub use events::{ErrorPayload, EventLog, SessionEvent, SessionListener};
pub use remote::{
    InMemoryCommandCenter, RemoteCommand, RemoteCommandCenter, RemoteCommandKind,
    RemoteCommandStatus, RemoteHandler, TargetToken,
};
pub use scheduler::{ManualScheduler, Scheduler, TickCallback, TimerGuard, TokioScheduler};
pub use session::{
    parse_source, PlaybackPhase, PlaybackSession, SessionBuilder, SessionInbox, SessionInput,
};
pub use surface::{
    project_now_playing, InMemorySurface, NowPlayingInfo, NowPlayingState, NowPlayingSurface,
    SessionSnapshot,
};
