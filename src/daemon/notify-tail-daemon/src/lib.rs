//! notify-tail daemon library
//!
//! Configuration, concrete notification sinks and the daemon that ties them
//! to the inotify-backed tailer.

pub mod config;
pub mod daemon;
pub mod sink;

pub use config::{LogFormat, SinkKind, TailConfig};
pub use daemon::Daemon;
pub use sink::{build_sink, DesktopSink, StdoutSink};
