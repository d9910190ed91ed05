/// Controller: single owner of the player, the status and the sink.
///
/// The UI collaborator either calls the async methods directly or sends
/// `Command`s into `run`.  The parser task never mutates anything: it emits
/// `ParserEvent`s on a per-session channel and the controller applies the
/// resulting transitions, so every notification comes from one place.
///
/// A new session gets a fresh parser channel and the old receiver is dropped
/// before the new process is wired, so late output from a retired player can
/// never be mistaken for the current stream.
use awr_proto::config::PlayerConfig;
use awr_proto::protocol::{Command, PlayerState, StreamRequest};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::{CommandWriteError, SpawnError};
use crate::parser::{escape_markup, ParserEvent};
use crate::player::{PlayerCommand, PlayerSupervisor};
use crate::sink::NotificationSink;
use crate::status::{StateManager, StatusEvent};

/// Everything the run loop can wake up for.
enum Input {
    Command(Option<Command>),
    Parser(ParserEvent),
}

pub struct Controller {
    supervisor: PlayerSupervisor,
    state: StateManager,
    sink: Box<dyn NotificationSink>,
    /// Events from the parser of the live session.  `None` between sessions.
    parser_rx: Option<mpsc::Receiver<ParserEvent>>,
}

impl Controller {
    pub fn new(config: &PlayerConfig, sink: impl NotificationSink + 'static) -> Self {
        Self {
            supervisor: PlayerSupervisor::new(config),
            state: StateManager::new(),
            sink: Box::new(sink),
            parser_rx: None,
        }
    }

    pub fn get_state(&self) -> PlayerState {
        self.state.get_state()
    }

    /// Live view of the state for readers outside the loop.
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    /// OS process id of the live player, if any.
    pub fn player_pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Run the controller loop.  Returns after `Command::Shutdown` or when all
    /// command senders are gone; the player is always shut down first.
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        info!("Controller: starting event loop");
        loop {
            let input = tokio::select! {
                cmd = cmd_rx.recv() => Input::Command(cmd),
                evt = recv_parser(&mut self.parser_rx) => Input::Parser(evt),
            };
            match input {
                Input::Command(None) => {
                    info!("Controller: command channel closed, shutting down");
                    break;
                }
                Input::Command(Some(Command::Shutdown)) => {
                    info!("Controller: shutdown requested");
                    break;
                }
                Input::Command(Some(cmd)) => self.handle_command(cmd).await,
                Input::Parser(evt) => self.handle_parser_event(evt).await,
            }
        }
        self.shutdown().await;
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) {
        debug!("Controller: command {:?}", cmd);
        match cmd {
            Command::Play { request } => {
                let name = request.name.clone();
                if let Err(e) = self.start(request).await {
                    error!("Controller: cannot play {}: {}", name, e);
                }
            }
            Command::Stop => self.stop().await,
            Command::TogglePause => {
                if let Err(e) = self.toggle_pause().await {
                    debug!("Controller: pause ignored: {}", e);
                }
            }
            Command::GetState => self.notify(),
            Command::Shutdown => self.shutdown().await,
        }
    }

    /// Next event from the live parser; `None` when no stream is running.
    pub async fn next_parser_event(&mut self) -> Option<ParserEvent> {
        let rx = self.parser_rx.as_mut()?;
        Some(next_or_closed(rx).await)
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Retire any running player, then spawn one for `request`.
    ///
    /// Fails fast with `SpawnError` when the player cannot be started; the
    /// status is then `Stopped`.
    pub async fn start(&mut self, request: StreamRequest) -> Result<(), SpawnError> {
        info!("Controller: start {} ({})", request.name, request.url);
        self.shutdown().await;

        let session = self
            .state
            .begin(request.clone())
            .ok_or(SpawnError::SessionActive)?;
        if let Err(e) = self.supervisor.spawn(&request).await {
            // nothing was announced yet, roll back quietly
            self.state.apply(StatusEvent::Stop);
            return Err(e);
        }
        self.notify();
        self.parser_rx = self.supervisor.attach_parser(session, self.state.subscribe());
        Ok(())
    }

    /// Ask the player to stop.  The status is `Stopped` when this returns,
    /// whether or not the player received the command.
    pub async fn stop(&mut self) {
        if !self.supervisor.is_live() {
            debug!("Controller: stop with no player");
            return;
        }
        let changed = self.state.apply(StatusEvent::Stop).is_some();
        if let Err(e) = self.supervisor.send_command(PlayerCommand::Stop).await {
            warn!("Controller: stop not delivered: {}", e);
        }
        if changed {
            self.notify();
        }
    }

    /// Flip between `Playing` and `Paused`.  Does nothing while stopped or
    /// initializing.  A failed write leaves the status unchanged and is
    /// returned so the caller can decide to ignore it.
    pub async fn toggle_pause(&mut self) -> Result<(), CommandWriteError> {
        if !self.supervisor.is_live() {
            return Ok(());
        }
        let status = self.state.status();
        if crate::status::transition(status, StatusEvent::TogglePause).is_none() {
            debug!("Controller: pause ignored in {:?}", status);
            return Ok(());
        }
        self.supervisor.send_command(PlayerCommand::Pause).await?;
        if self.state.apply(StatusEvent::TogglePause).is_some() {
            self.notify();
        }
        Ok(())
    }

    /// Stop and tear the player down: `quit`, bounded grace period, kill.
    /// Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        if self.state.apply(StatusEvent::Stop).is_some() {
            self.notify();
        }
        // drop the receiver first so a parser blocked on send exits
        self.parser_rx = None;
        if self.supervisor.is_live() {
            info!("Controller: retiring player pid {:?}", self.supervisor.pid());
            self.supervisor.retire().await;
        }
    }

    // ── parser events ─────────────────────────────────────────────────────────

    pub async fn handle_parser_event(&mut self, event: ParserEvent) {
        match event {
            ParserEvent::MetadataFound(track) => {
                if self.state.set_track(track).is_some() {
                    self.notify();
                } else {
                    debug!("Controller: metadata after stop ignored");
                }
            }
            ParserEvent::ChannelClosed => {
                self.parser_rx = None;
                if self.state.apply(StatusEvent::ChannelClosed).is_some() {
                    warn!("Controller: player output closed unexpectedly, stream failed");
                    self.notify();
                    self.sink.on_stream_error();
                } else {
                    debug!("Controller: player output closed after stop");
                }
                self.supervisor.retire().await;
            }
        }
    }

    fn notify(&self) {
        let state = self.state.get_state();
        let title = state.track.as_ref().map(|t| escape_markup(&t.title));
        self.sink.on_status_changed(state.status, title.as_deref());
    }
}

/// A parser that exits without a close event (it saw its session stopped)
/// still leaves a process to reap, so a drained channel reads as closed.
async fn next_or_closed(rx: &mut mpsc::Receiver<ParserEvent>) -> ParserEvent {
    rx.recv().await.unwrap_or(ParserEvent::ChannelClosed)
}

async fn recv_parser(rx: &mut Option<mpsc::Receiver<ParserEvent>>) -> ParserEvent {
    match rx.as_mut() {
        Some(r) => next_or_closed(r).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BroadcastMessage;
    use awr_proto::protocol::PlaybackStatus;
    use tokio::sync::broadcast;

    fn controller() -> (Controller, broadcast::Receiver<BroadcastMessage>) {
        let (tx, rx) = broadcast::channel(64);
        let config = PlayerConfig {
            binary: "/nonexistent/awr-test-player".to_string(),
            shutdown_grace_ms: 50,
            ..PlayerConfig::default()
        };
        (Controller::new(&config, tx), rx)
    }

    #[tokio::test]
    async fn test_commands_without_player_are_noops() {
        let (mut ctl, mut rx) = controller();
        ctl.stop().await;
        ctl.toggle_pause().await.unwrap();
        ctl.shutdown().await;
        assert_eq!(ctl.get_state().status, PlaybackStatus::Stopped);
        assert_eq!(ctl.get_state().rev, 0);
        assert!(rx.try_recv().is_err());
        assert!(ctl.next_parser_event().await.is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_stopped() {
        let (mut ctl, mut rx) = controller();
        let err = ctl
            .start(StreamRequest::direct("x", "http://x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::NotFound(_)));
        let state = ctl.get_state();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert!(state.current.is_none());
        assert!(ctl.player_pid().is_none());
        assert!(ctl.next_parser_event().await.is_none());
        assert!(rx.try_recv().is_err());

        // a failed start does not block the next one
        let err = ctl
            .start(StreamRequest::direct("y", "http://y"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpawnError::NotFound(_)));
        assert_eq!(ctl.get_state().status, PlaybackStatus::Stopped);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown_command() {
        let (ctl, _rx) = controller();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(ctl.run(cmd_rx));
        cmd_tx.send(Command::GetState).await.unwrap();
        cmd_tx.send(Command::Shutdown).await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_senders_dropped() {
        let (ctl, mut rx) = controller();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(ctl.run(cmd_rx));
        cmd_tx.send(Command::GetState).await.unwrap();
        drop(cmd_tx);
        task.await.unwrap().unwrap();

        // GetState re-announces the current status
        assert_eq!(
            rx.recv().await.unwrap(),
            BroadcastMessage::StatusChanged {
                status: PlaybackStatus::Stopped,
                title: None,
            }
        );
    }
}
