//! Inbound method calls from the host.

use serde::Deserialize;
use serde_json::Value;
use tempo_core::TrackMetadata;

use crate::{SessionError, SessionResult};

/// Raw `{ "method": ..., "arguments": ... }` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of a `play` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayRequest {
    pub url: String,
    #[serde(flatten)]
    pub track: TrackMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Play(PlayRequest),
    Pause,
    Resume,
    Stop,
    /// Relative position in [0, 1].
    Seek { fraction: f64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeekArguments {
    Bare(f64),
    Named { fraction: f64 },
}

impl HostCommand {
    pub fn from_json(line: &str) -> SessionResult<Self> {
        let call: MethodCall =
            serde_json::from_str(line).map_err(|err| SessionError::InvalidArguments {
                method: "<envelope>".into(),
                message: err.to_string(),
            })?;
        Self::from_call(call)
    }

    pub fn from_call(call: MethodCall) -> SessionResult<Self> {
        let MethodCall { method, arguments } = call;
        let invalid = |err: serde_json::Error| SessionError::InvalidArguments {
            method: method.clone(),
            message: err.to_string(),
        };

        match method.as_str() {
            "play" => serde_json::from_value(arguments)
                .map(HostCommand::Play)
                .map_err(invalid),
            "pause" => Ok(HostCommand::Pause),
            "resume" => Ok(HostCommand::Resume),
            "stop" => Ok(HostCommand::Stop),
            "seek" => {
                let fraction = match serde_json::from_value(arguments).map_err(invalid)? {
                    SeekArguments::Bare(fraction) => fraction,
                    SeekArguments::Named { fraction } => fraction,
                };
                Ok(HostCommand::Seek { fraction })
            }
            _ => Err(SessionError::UnknownCommand(method.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Play(_) => "play",
            HostCommand::Pause => "pause",
            HostCommand::Resume => "resume",
            HostCommand::Stop => "stop",
            HostCommand::Seek { .. } => "seek",
        }
    }
}

/// Value returned to the host for a successful call, e.g. `"linux x86_64"`.
pub fn platform_reply() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}
