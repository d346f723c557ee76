//! System remote-control commands (headset buttons, lock screen controls).

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteCommandKind {
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    ChangePlaybackPosition,
}

impl RemoteCommandKind {
    pub const ALL: [RemoteCommandKind; 4] = [
        RemoteCommandKind::TogglePlayPause,
        RemoteCommandKind::NextTrack,
        RemoteCommandKind::PreviousTrack,
        RemoteCommandKind::ChangePlaybackPosition,
    ];
}

/// A command delivered by the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    /// Absolute position in seconds.
    ChangePlaybackPosition { position_seconds: f64 },
}

impl RemoteCommand {
    pub fn kind(&self) -> RemoteCommandKind {
        match self {
            RemoteCommand::TogglePlayPause => RemoteCommandKind::TogglePlayPause,
            RemoteCommand::NextTrack => RemoteCommandKind::NextTrack,
            RemoteCommand::PreviousTrack => RemoteCommandKind::PreviousTrack,
            RemoteCommand::ChangePlaybackPosition { .. } => {
                RemoteCommandKind::ChangePlaybackPosition
            }
        }
    }
}

/// Handler verdict reported back to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommandStatus {
    Success,
    NoActionableNowPlayingItem,
    CommandFailed,
}

pub type RemoteHandler = Arc<dyn Fn(RemoteCommand) -> RemoteCommandStatus + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetToken(u64);

impl TargetToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Registration point for remote-control handlers.
pub trait RemoteCommandCenter: Send + Sync {
    fn set_enabled(&self, kind: RemoteCommandKind, enabled: bool);
    fn add_target(&self, kind: RemoteCommandKind, handler: RemoteHandler) -> TargetToken;
    /// Removing an unknown token is a no-op.
    fn remove_target(&self, kind: RemoteCommandKind, token: TargetToken);
}

#[derive(Default)]
struct CenterState {
    targets: BTreeMap<TargetToken, (RemoteCommandKind, RemoteHandler)>,
    enabled: HashSet<RemoteCommandKind>,
    next_token: u64,
    removals: usize,
}

/// Command center kept entirely in process. Hosts without a system
/// integration use it directly; [`dispatch`](Self::dispatch) plays the role
/// of the OS delivering a command.
#[derive(Clone, Default)]
pub struct InMemoryCommandCenter {
    state: Arc<Mutex<CenterState>>,
}

impl std::fmt::Debug for InMemoryCommandCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryCommandCenter")
            .field("targets", &state.targets.len())
            .field("enabled", &state.enabled)
            .finish()
    }
}

impl InMemoryCommandCenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CenterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn dispatch(&self, command: RemoteCommand) -> RemoteCommandStatus {
        let kind = command.kind();
        let handlers: Vec<RemoteHandler> = {
            let state = self.state();
            if !state.enabled.contains(&kind) {
                return RemoteCommandStatus::CommandFailed;
            }
            state
                .targets
                .values()
                .filter(|(target_kind, _)| *target_kind == kind)
                .map(|(_, handler)| handler.clone())
                .collect()
        };

        let mut status = RemoteCommandStatus::NoActionableNowPlayingItem;
        for handler in handlers {
            status = handler(command);
        }
        status
    }

    pub fn is_enabled(&self, kind: RemoteCommandKind) -> bool {
        self.state().enabled.contains(&kind)
    }

    pub fn target_count(&self) -> usize {
        self.state().targets.len()
    }

    pub fn removals(&self) -> usize {
        self.state().removals
    }
}

impl RemoteCommandCenter for InMemoryCommandCenter {
    fn set_enabled(&self, kind: RemoteCommandKind, enabled: bool) {
        let mut state = self.state();
        if enabled {
            state.enabled.insert(kind);
        } else {
            state.enabled.remove(&kind);
        }
    }

    fn add_target(&self, kind: RemoteCommandKind, handler: RemoteHandler) -> TargetToken {
        let mut state = self.state();
        state.next_token += 1;
        let token = TargetToken::new(state.next_token);
        state.targets.insert(token, (kind, handler));
        token
    }

    fn remove_target(&self, kind: RemoteCommandKind, token: TargetToken) {
        let mut state = self.state();
        let matches = state
            .targets
            .get(&token)
            .is_some_and(|(target_kind, _)| *target_kind == kind);
        if matches {
            state.targets.remove(&token);
            state.removals += 1;
        }
    }
}
