use std::io;

use crate::player::PlayerCommand;

/// The player process could not be started.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    #[error("player binary not found: {0}")]
    NotFound(String),
    #[error("permission denied running {0}")]
    PermissionDenied(String),
    #[error("failed to spawn player: {0}")]
    Io(#[from] io::Error),
    #[error("previous stream is still active")]
    SessionActive,
}

impl SpawnError {
    /// Classify the common spawn failures so callers can show a useful hint.
    pub(crate) fn from_io(binary: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(binary.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(binary.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// A slave-mode command could not be written to the player.
#[derive(thiserror::Error, Debug)]
pub enum CommandWriteError {
    #[error("no player process is running")]
    NoPlayer,
    #[error("player input closed, `{0}` not delivered")]
    Closed(PlayerCommand),
    #[error("failed to write `{command}` to player: {source}")]
    Io {
        command: PlayerCommand,
        #[source]
        source: io::Error,
    },
}

impl CommandWriteError {
    pub(crate) fn from_io(command: PlayerCommand, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => Self::Closed(command),
            _ => Self::Io {
                command,
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_classification() {
        let err = SpawnError::from_io("mplayer", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, SpawnError::NotFound(ref b) if b == "mplayer"));

        let err = SpawnError::from_io("mplayer", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, SpawnError::PermissionDenied(_)));

        let err = SpawnError::from_io("mplayer", io::Error::from(io::ErrorKind::Interrupted));
        assert!(matches!(err, SpawnError::Io(_)));
        assert_eq!(
            SpawnError::SessionActive.to_string(),
            "previous stream is still active"
        );
    }

    #[test]
    fn test_closed_pipe_is_closed() {
        let err = CommandWriteError::from_io(
            PlayerCommand::Pause,
            io::Error::from(io::ErrorKind::BrokenPipe),
        );
        assert_eq!(err.to_string(), "player input closed, `pause` not delivered");
    }
}
