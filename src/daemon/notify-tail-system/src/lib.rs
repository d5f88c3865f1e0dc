//! notify-tail system integration
//!
//! Connects the core data model to the kernel: an inotify event source, the
//! watch lifecycle that reacts to its events, and the dispatcher that drives
//! both from a single blocking loop.
//!
//! Linux only: the event source is built on inotify.

pub mod dispatch;
pub mod inotify;
pub mod sink;
pub mod source;
pub mod tailer;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{EventDispatcher, DEFAULT_MAX_SOURCE_ERRORS};
pub use inotify::{decode_events, InotifySource, DEFAULT_EVENT_BUFFER_SIZE, MIN_EVENT_BUFFER_SIZE};
pub use sink::{LineDelivery, Notification, NotificationSink, Urgency, DEFAULT_TIMEOUT};
pub use source::EventSource;
pub use tailer::{StartAt, TailOptions, Tailer};
