/// Player output parser.
///
/// One task per live player process drains its stdout line by line and turns
/// it into `ParserEvent`s for the controller:
///
/// ```text
///   player stdout ──► run_parser ──► MetadataFound(track)   (ICY Info lines)
///                                └─► ChannelClosed          (EOF / read error)
/// ```
///
/// The parser never touches the status itself.  It reads it through a
/// `watch` receiver and exits quietly as soon as its session is stopped or
/// superseded, so output produced after a user stop is never reported.
use std::collections::HashMap;
use std::sync::OnceLock;

use awr_proto::protocol::{PlayerState, TrackMetadata};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

const ICY_PREFIX: &str = "ICY Info:";
const STREAM_TITLE_KEY: &str = "StreamTitle";
pub const UNKNOWN_TITLE: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    /// An `ICY Info:` line was seen.
    MetadataFound(TrackMetadata),
    /// The output channel reached EOF or failed.  Whether this is a stream
    /// failure is decided by the controller from the current status.
    ChannelClosed,
}

fn icy_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)='([^']*)'").expect("static regex"))
}

/// Parse a metadata line such as `ICY Info: StreamTitle='Artist - Song';StreamUrl='';`.
///
/// Returns `None` for anything that is not an ICY line.  A missing
/// `StreamTitle` yields the `(unknown)` marker.
pub fn parse_icy_line(line: &str) -> Option<TrackMetadata> {
    let line = line.trim_end();
    if !line.starts_with(ICY_PREFIX) {
        return None;
    }
    let info = line.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("");
    let attrs: HashMap<&str, &str> = icy_pair_regex()
        .captures_iter(info)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();
    let title = attrs
        .get(STREAM_TITLE_KEY)
        .copied()
        .unwrap_or(UNKNOWN_TITLE)
        .to_string();
    Some(TrackMetadata { title })
}

/// Escape markup-significant characters so a title can be rendered by a
/// markup-aware label.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_retired(state_rx: &watch::Receiver<PlayerState>, session: u64) -> bool {
    let state = state_rx.borrow();
    !state.status.is_active() || state.session != session
}

/// Drain `reader` until EOF, a read error, or until `session` is stopped.
///
/// Lines are decoded lossily: stream titles are frequently not UTF-8.
pub async fn run_parser<R>(
    reader: R,
    session: u64,
    state_rx: watch::Receiver<PlayerState>,
    event_tx: mpsc::Sender<ParserEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("parser: session {} output closed", session);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("parser: session {} read error: {}", session, e);
                break;
            }
        }

        if is_retired(&state_rx, session) {
            debug!("parser: session {} stopped, exiting", session);
            return;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        match parse_icy_line(line) {
            Some(track) => {
                info!("parser: session {} title {:?}", session, track.title);
                if event_tx.send(ParserEvent::MetadataFound(track)).await.is_err() {
                    debug!("parser: session {} receiver gone", session);
                    return;
                }
            }
            None => trace!("parser: {}", line),
        }
    }
    let _ = event_tx.send(ParserEvent::ChannelClosed).await;
}
