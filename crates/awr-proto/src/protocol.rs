use serde::{Deserialize, Serialize};

/// Commands sent from the UI collaborator into the controller loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum Command {
    Play { request: StreamRequest },
    Stop,
    TogglePause,
    GetState,
    Shutdown,
}

/// Which stream to start.  Supplied per play action and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamRequest {
    pub name: String,
    pub url: String,
    /// When true the url points at a playlist the player resolves itself.
    #[serde(default)]
    pub is_playlist: bool,
}

impl StreamRequest {
    pub fn direct(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_playlist: false,
        }
    }

    pub fn playlist(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_playlist: true,
        }
    }
}

/// Playback status of the controlled player.
///
/// Transitions:
///   Stopped -> Initializing -> Playing <-> Paused
///   Initializing | Playing | Paused -> Stopped (stop, or stream failure)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped, // nothing running, or explicitly stopped
    Initializing, // process spawned, no metadata seen yet
    Playing,      // metadata flowing
    Paused,       // explicitly paused
}

impl PlaybackStatus {
    /// True while a player process is expected to be alive.
    pub fn is_active(self) -> bool {
        !matches!(self, PlaybackStatus::Stopped)
    }

    /// Short label for status lines.
    pub fn label(self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Initializing => "init",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        }
    }
}

/// Now-playing information parsed from the player output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
}

/// Snapshot of the controller state.  `rev` is a monotonically increasing
/// counter incremented every time the state changes, so readers can detect
/// missed updates.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    /// Bumped once per started stream; output from older sessions is stale.
    #[serde(default)]
    pub session: u64,
    pub status: PlaybackStatus,
    pub current: Option<StreamRequest>,
    pub track: Option<TrackMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::Play {
            request: StreamRequest::playlist("Radio", "http://x/list.pls"),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""cmd":"Play""#));
        assert!(json.contains(r#""is_playlist":true"#));

        let back: Command = serde_json::from_str(r#"{"cmd":"TogglePause"}"#).unwrap();
        assert!(matches!(back, Command::TogglePause));
    }

    #[test]
    fn test_request_playlist_defaults_to_false() {
        let req: StreamRequest =
            serde_json::from_str(r#"{"name":"a","url":"http://x"}"#).unwrap();
        assert!(!req.is_playlist);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Stopped);
        assert!(!PlaybackStatus::Stopped.is_active());
        assert!(PlaybackStatus::Paused.is_active());
        assert_eq!(PlaybackStatus::Initializing.label(), "init");
    }
}
