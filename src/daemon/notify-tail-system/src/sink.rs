//! Notification output
//!
//! [`NotificationSink`] is the seam to whatever shows a message to the user.
//! [`LineDelivery`] sits in front of it and turns raw line bytes into
//! notifications.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default notification timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub urgency: Urgency,
    pub timeout: Duration,
}

/// Anything that can display a notification
pub trait NotificationSink {
    fn show(&mut self, notification: &Notification) -> Result<()>;
}

impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn show(&mut self, notification: &Notification) -> Result<()> {
        (**self).show(notification)
    }
}

/// Adapter between assembled lines and a sink
#[derive(Debug)]
pub struct LineDelivery<K> {
    sink: K,
    urgency: Urgency,
    timeout: Duration,
}

impl<K: NotificationSink> LineDelivery<K> {
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            urgency: Urgency::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_style(mut self, urgency: Urgency, timeout: Duration) -> Self {
        self.urgency = urgency;
        self.timeout = timeout;
        self
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Show one line read from `source`. Empty lines are skipped and text
    /// that is not valid UTF-8 is replaced by a diagnostic message.
    ///
    /// Returns true when the sink accepted a notification.
    pub fn deliver(&mut self, source: &Path, line: &[u8]) -> bool {
        if line.is_empty() {
            return false;
        }

        let message = match std::str::from_utf8(line) {
            Ok(text) => text.to_string(),
            Err(_) => format!("ERROR: Read invalid line from '{}'", source.display()),
        };

        let notification = Notification {
            message,
            urgency: self.urgency,
            timeout: self.timeout,
        };

        match self.sink.show(&notification) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to show notification for '{}': {:#}", source.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[test]
    fn test_deliver_plain_line() {
        let mut delivery = LineDelivery::new(RecordingSink::default());
        assert!(delivery.deliver(Path::new("/tmp/log.txt"), b"hello"));

        let shown = &delivery.sink().shown;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "hello");
        assert_eq!(shown[0].urgency, Urgency::Low);
        assert_eq!(shown[0].timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn test_empty_line_is_skipped() {
        let mut delivery = LineDelivery::new(RecordingSink::default());
        assert!(!delivery.deliver(Path::new("/tmp/log.txt"), b""));
        assert!(delivery.sink().shown.is_empty());
    }

    #[test]
    fn test_invalid_text_is_replaced() {
        let mut delivery = LineDelivery::new(RecordingSink::default());
        assert!(delivery.deliver(Path::new("/var/log/app.log"), &[0x66, 0xff, 0xfe]));
        assert_eq!(
            delivery.sink().shown[0].message,
            "ERROR: Read invalid line from '/var/log/app.log'"
        );
    }

    #[test]
    fn test_custom_style() {
        let mut delivery = LineDelivery::new(RecordingSink::default())
            .with_style(Urgency::Critical, Duration::from_secs(3));
        delivery.deliver(Path::new("a"), b"boom");
        assert_eq!(delivery.sink().shown[0].urgency, Urgency::Critical);
        assert_eq!(delivery.sink().shown[0].timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let mut delivery = LineDelivery::new(RecordingSink::failing());
        assert!(!delivery.deliver(Path::new("a"), b"line"));
        assert_eq!(delivery.sink().attempts, 1);
    }
}
