//! Slave-mode stream player controller.
//!
//! Starts, stops and pauses an external player process, parses its output for
//! ICY now-playing metadata, and reports status changes and stream failures
//! to a [`sink::NotificationSink`].
pub mod controller;
pub mod error;
pub mod parser;
pub mod player;
pub mod sink;
pub mod status;

pub use controller::Controller;
pub use error::{CommandWriteError, SpawnError};
pub use sink::{BroadcastMessage, NotificationSink};
