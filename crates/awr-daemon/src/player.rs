/// Slave-mode player process supervisor.
///
/// Architecture:
///
/// ```text
///   PlayerSupervisor::spawn(request)
///         │
///         ├── stdin   ← PlayerCommand lines ("stop", "pause", "quit")
///         └── stdout  → attach_parser() → parser task → ParserEvent channel
/// ```
///
/// At most one `PlayerHandle` exists at a time.  `retire()` is the only way a
/// handle goes away: `quit`, a bounded wait, then a kill, then the parser task
/// is joined (or aborted) so nothing outlives the process.
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use awr_proto::config::PlayerConfig;
use awr_proto::protocol::{PlayerState, StreamRequest};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{CommandWriteError, SpawnError};
use crate::parser::{run_parser, ParserEvent};

const PARSER_CHANNEL_CAPACITY: usize = 64;
/// How long a retired parser may take to drain once the process is gone.
const PARSER_JOIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Text commands understood by the player in slave mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Stop,
    Pause,
    Quit,
}

impl PlayerCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerCommand::Stop => "stop",
            PlayerCommand::Pause => "pause",
            PlayerCommand::Quit => "quit",
        }
    }
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the player argument list for `request`.
pub fn build_args(extra_args: &[String], request: &StreamRequest) -> Vec<String> {
    let mut args = extra_args.to_vec();
    args.push("-slave".to_string());
    if request.is_playlist {
        args.push("-playlist".to_string());
    }
    args.push(request.url.clone());
    args
}

/// Exclusive ownership of one running player process.
struct PlayerHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Handed to the parser by `attach_parser`.
    stdout: Option<ChildStdout>,
    pid: Option<u32>,
    parser: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    async fn write(&mut self, command: PlayerCommand) -> Result<(), CommandWriteError> {
        let stdin = self.stdin.as_mut().ok_or(CommandWriteError::NoPlayer)?;
        let line = format!("{}\n", command.as_str());
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CommandWriteError::from_io(command, e))?;
        stdin
            .flush()
            .await
            .map_err(|e| CommandWriteError::from_io(command, e))?;
        debug!("player: pid {:?} ← {}", self.pid, command);
        Ok(())
    }
}

/// Owns the player child process.
pub struct PlayerSupervisor {
    binary: PathBuf,
    extra_args: Vec<String>,
    grace: Duration,
    handle: Option<PlayerHandle>,
}

impl PlayerSupervisor {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            binary: awr_proto::platform::find_player_binary(&config.binary),
            extra_args: config.extra_args.clone(),
            grace: config.shutdown_grace(),
            handle: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// OS process id of the live player, if any.
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid)
    }

    /// Spawn the player for `request`, retiring any previous process first.
    pub async fn spawn(&mut self, request: &StreamRequest) -> Result<(), SpawnError> {
        // Kill stale process
        self.retire().await;

        let args = build_args(&self.extra_args, request);
        info!("player: spawning {} {:?}", self.binary.display(), args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(&self.binary.display().to_string(), e))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        info!("player: started pid {:?} for {}", pid, request.name);

        self.handle = Some(PlayerHandle {
            child,
            stdin,
            stdout,
            pid,
            parser: None,
        });
        Ok(())
    }

    /// Start the output parser for the live handle.  Returns the event
    /// channel for `session`, or `None` if there is no handle or its output
    /// was already taken.
    pub fn attach_parser(
        &mut self,
        session: u64,
        state_rx: watch::Receiver<PlayerState>,
    ) -> Option<mpsc::Receiver<ParserEvent>> {
        let handle = self.handle.as_mut()?;
        let stdout = handle.stdout.take()?;
        let (event_tx, event_rx) = mpsc::channel(PARSER_CHANNEL_CAPACITY);
        handle.parser = Some(tokio::spawn(run_parser(stdout, session, state_rx, event_tx)));
        debug!("player: parser attached to pid {:?} session {}", handle.pid, session);
        Some(event_rx)
    }

    pub async fn send_command(&mut self, command: PlayerCommand) -> Result<(), CommandWriteError> {
        match self.handle.as_mut() {
            Some(handle) => handle.write(command).await,
            None => Err(CommandWriteError::NoPlayer),
        }
    }

    /// Tear down the live handle, if any.
    ///
    /// Sends `quit` (best effort) and gives the process until `grace` has
    /// elapsed to exit on its own, the write included.  Kills it if it has
    /// not, then gives the parser `PARSER_JOIN_TIMEOUT` to drain and aborts
    /// it otherwise.
    pub async fn retire(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        let pid = handle.pid;
        let deadline = Instant::now() + self.grace;

        match timeout_at(deadline, handle.write(PlayerCommand::Quit)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("player: pid {:?} quit not delivered: {}", pid, e),
            Err(_) => debug!("player: pid {:?} not reading input, quit not delivered", pid),
        }
        // closing stdin is a second hint for players that ignore quit
        drop(handle.stdin.take());

        match timeout_at(deadline, handle.child.wait()).await {
            Ok(Ok(status)) => info!("player: pid {:?} exited: {}", pid, status),
            Ok(Err(e)) => warn!("player: pid {:?} wait failed: {}", pid, e),
            Err(_) => {
                warn!(
                    "player: pid {:?} still running after {:?}, killing",
                    pid, self.grace
                );
                if let Err(e) = handle.child.kill().await {
                    warn!("player: failed to kill pid {:?}: {}", pid, e);
                }
            }
        }

        if let Some(mut parser) = handle.parser.take() {
            if tokio::time::timeout(PARSER_JOIN_TIMEOUT, &mut parser).await.is_err() {
                warn!("player: parser for pid {:?} did not finish, aborting", pid);
                parser.abort();
            }
        }
    }
}
