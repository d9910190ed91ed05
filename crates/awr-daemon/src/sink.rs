use awr_proto::protocol::PlaybackStatus;
use tokio::sync::broadcast;

/// What the controller tells the UI collaborator.
///
/// Implementations must not block: the controller calls these from its own
/// loop and expects them to return immediately.
pub trait NotificationSink: Send + Sync {
    /// Status changed, or a new title arrived.  `track_title` is already
    /// markup-escaped.
    fn on_status_changed(&self, status: PlaybackStatus, track_title: Option<&str>);

    /// The stream died without the user stopping it.  Always preceded by an
    /// `on_status_changed(Stopped, None)`.
    fn on_stream_error(&self);
}

/// Everything pushed to UI listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastMessage {
    StatusChanged {
        status: PlaybackStatus,
        title: Option<String>,
    },
    StreamError,
    /// A WARN/ERROR log line, see the `BroadcastLayer` in the binary.
    Log(String),
}

/// Fan notifications out over a broadcast channel so each UI listener
/// re-renders on its own task.
impl NotificationSink for broadcast::Sender<BroadcastMessage> {
    fn on_status_changed(&self, status: PlaybackStatus, track_title: Option<&str>) {
        // no receivers is OK
        let _ = self.send(BroadcastMessage::StatusChanged {
            status,
            title: track_title.map(str::to_string),
        });
    }

    fn on_stream_error(&self) {
        let _ = self.send(BroadcastMessage::StreamError);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_sink_forwards() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.on_status_changed(PlaybackStatus::Playing, Some("Song A"));
        tx.on_stream_error();

        assert_eq!(
            rx.try_recv().unwrap(),
            BroadcastMessage::StatusChanged {
                status: PlaybackStatus::Playing,
                title: Some("Song A".into()),
            }
        );
        assert_eq!(rx.try_recv().unwrap(), BroadcastMessage::StreamError);
    }

    #[test]
    fn test_send_without_listeners_is_fine() {
        let (tx, rx) = broadcast::channel::<BroadcastMessage>(8);
        drop(rx);
        tx.on_stream_error();
    }
}
