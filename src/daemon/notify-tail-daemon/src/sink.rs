//! Concrete notification sinks

use std::io::{self, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};
use notify_tail_system::{Notification, NotificationSink};

use crate::config::{NotificationConfig, SinkKind};

const NOTIFY_SEND: &str = "notify-send";

/// Desktop notifications through the freedesktop `notify-send` helper
#[derive(Debug, Clone)]
pub struct DesktopSink {
    app_name: String,
}

impl DesktopSink {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn args(&self, notification: &Notification) -> Vec<String> {
        vec![
            "--app-name".to_string(),
            self.app_name.clone(),
            "--urgency".to_string(),
            notification.urgency.as_str().to_string(),
            "--expire-time".to_string(),
            notification.timeout.as_millis().to_string(),
            // Messages may start with a dash
            "--".to_string(),
            notification.message.clone(),
        ]
    }
}

impl NotificationSink for DesktopSink {
    fn show(&mut self, notification: &Notification) -> Result<()> {
        let status = Command::new(NOTIFY_SEND)
            .args(self.args(notification))
            .status()
            .with_context(|| format!("Failed to run {NOTIFY_SEND}"))?;

        if !status.success() {
            bail!("{NOTIFY_SEND} exited with {status}");
        }
        Ok(())
    }
}

/// Writes each message as one line
#[derive(Debug)]
pub struct StdoutSink<W = io::Stdout> {
    out: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> NotificationSink for StdoutSink<W> {
    fn show(&mut self, notification: &Notification) -> Result<()> {
        writeln!(self.out, "{}", notification.message)?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn build_sink(config: &NotificationConfig) -> Box<dyn NotificationSink> {
    match config.sink {
        SinkKind::Desktop => Box::new(DesktopSink::new(config.app_name.clone())),
        SinkKind::Stdout => Box::new(StdoutSink::new()),
    }
}
