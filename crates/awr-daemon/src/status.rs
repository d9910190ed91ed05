/// Playback status state machine and the shared state cell.
///
/// `transition` is the whole rule table; everything else goes through
/// `StateManager`, which publishes each change on a `watch` channel so the
/// parser task observes a `Stopped` written by the controller before it
/// handles another line.
use awr_proto::protocol::{PlaybackStatus, PlayerState, StreamRequest, TrackMetadata};
use tokio::sync::watch;
use tracing::debug;

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Start,
    MetadataFound,
    Stop,
    TogglePause,
    ChannelClosed,
}

/// Next status for `event`, or `None` when the event does not apply in
/// `from`.  Inapplicable events are no-ops, never errors.
pub fn transition(from: PlaybackStatus, event: StatusEvent) -> Option<PlaybackStatus> {
    use PlaybackStatus::*;
    match (from, event) {
        (Stopped, StatusEvent::Start) => Some(Initializing),
        (Initializing, StatusEvent::MetadataFound) => Some(Playing),
        (Initializing | Playing | Paused, StatusEvent::Stop | StatusEvent::ChannelClosed) => {
            Some(Stopped)
        }
        (Playing, StatusEvent::TogglePause) => Some(Paused),
        (Paused, StatusEvent::TogglePause) => Some(Playing),
        _ => None,
    }
}

pub struct StateManager {
    tx: watch::Sender<PlayerState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PlayerState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.tx.subscribe()
    }

    pub fn get_state(&self) -> PlayerState {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.tx.borrow().status
    }

    /// Apply `event`; returns the new status if anything changed.
    /// Entering `Stopped` clears the request and the track.
    pub fn apply(&self, event: StatusEvent) -> Option<PlaybackStatus> {
        let mut changed = None;
        self.tx.send_if_modified(|state| {
            let Some(next) = transition(state.status, event) else {
                debug!("status: {:?} ignored in {:?}", event, state.status);
                return false;
            };
            debug!("status: {:?} → {:?} on {:?}", state.status, next, event);
            state.status = next;
            if next == PlaybackStatus::Stopped {
                state.current = None;
                state.track = None;
            }
            state.rev += 1;
            changed = Some(next);
            true
        });
        changed
    }

    /// Open a new session for `request`.  Returns the session id, or `None`
    /// if the previous session was not stopped first.
    pub fn begin(&self, request: StreamRequest) -> Option<u64> {
        let mut session = None;
        self.tx.send_if_modified(|state| {
            if transition(state.status, StatusEvent::Start).is_none() {
                return false;
            }
            state.status = PlaybackStatus::Initializing;
            state.session += 1;
            state.current = Some(request);
            state.track = None;
            state.rev += 1;
            session = Some(state.session);
            true
        });
        session
    }

    /// Record a parsed title.  The first one moves `Initializing` to
    /// `Playing`; a paused stream keeps its status.  Ignored once stopped.
    pub fn set_track(&self, track: TrackMetadata) -> Option<PlaybackStatus> {
        let mut status = None;
        self.tx.send_if_modified(|state| {
            if !state.status.is_active() {
                return false;
            }
            if let Some(next) = transition(state.status, StatusEvent::MetadataFound) {
                debug!("status: {:?} → {:?} on first metadata", state.status, next);
                state.status = next;
            }
            state.track = Some(track);
            state.rev += 1;
            status = Some(state.status);
            true
        });
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awr_proto::protocol::PlaybackStatus::*;

    const ALL_STATUSES: [PlaybackStatus; 4] = [Stopped, Initializing, Playing, Paused];
    const ALL_EVENTS: [StatusEvent; 5] = [
        StatusEvent::Start,
        StatusEvent::MetadataFound,
        StatusEvent::Stop,
        StatusEvent::TogglePause,
        StatusEvent::ChannelClosed,
    ];

    #[test]
    fn test_transition_table() {
        assert_eq!(transition(Stopped, StatusEvent::Start), Some(Initializing));
        assert_eq!(transition(Initializing, StatusEvent::MetadataFound), Some(Playing));
        assert_eq!(transition(Playing, StatusEvent::TogglePause), Some(Paused));
        assert_eq!(transition(Paused, StatusEvent::TogglePause), Some(Playing));
        for from in [Initializing, Playing, Paused] {
            assert_eq!(transition(from, StatusEvent::Stop), Some(Stopped));
            assert_eq!(transition(from, StatusEvent::ChannelClosed), Some(Stopped));
        }
    }

    #[test]
    fn test_everything_else_is_a_noop() {
        let mut applicable = 0;
        for from in ALL_STATUSES {
            for event in ALL_EVENTS {
                if transition(from, event).is_some() {
                    applicable += 1;
                }
            }
        }
        // 1 start + 1 metadata + 3 stop + 3 close + 2 toggles
        assert_eq!(applicable, 10);
        assert_eq!(transition(Stopped, StatusEvent::TogglePause), None);
        assert_eq!(transition(Initializing, StatusEvent::TogglePause), None);
        assert_eq!(transition(Stopped, StatusEvent::Stop), None);
        assert_eq!(transition(Playing, StatusEvent::Start), None);
    }

    #[test]
    fn test_manager_lifecycle() {
        let manager = StateManager::new();
        let rx = manager.subscribe();
        assert_eq!(manager.status(), Stopped);

        let session = manager.begin(StreamRequest::direct("x", "http://x")).unwrap();
        assert_eq!(session, 1);
        assert_eq!(rx.borrow().status, Initializing);

        let status = manager.set_track(TrackMetadata {
            title: "Song A".into(),
        });
        assert_eq!(status, Some(Playing));
        assert_eq!(manager.apply(StatusEvent::TogglePause), Some(Paused));

        // a title update while paused does not resume
        let status = manager.set_track(TrackMetadata {
            title: "Song B".into(),
        });
        assert_eq!(status, Some(Paused));

        assert_eq!(manager.apply(StatusEvent::Stop), Some(Stopped));
        let state = manager.get_state();
        assert!(state.current.is_none());
        assert!(state.track.is_none());
        assert_eq!(state.session, 1);
    }

    #[test]
    fn test_begin_requires_stopped() {
        let manager = StateManager::new();
        manager.begin(StreamRequest::direct("a", "http://a")).unwrap();
        assert!(manager.begin(StreamRequest::direct("b", "http://b")).is_none());
        assert_eq!(manager.get_state().current.unwrap().name, "a");

        manager.apply(StatusEvent::Stop);
        assert_eq!(manager.begin(StreamRequest::direct("b", "http://b")), Some(2));
    }

    #[test]
    fn test_noops_do_not_bump_rev() {
        let manager = StateManager::new();
        let rev = manager.get_state().rev;
        assert_eq!(manager.apply(StatusEvent::TogglePause), None);
        assert_eq!(manager.apply(StatusEvent::Stop), None);
        assert!(manager
            .set_track(TrackMetadata {
                title: "late".into()
            })
            .is_none());
        assert_eq!(manager.get_state().rev, rev);
    }
}
