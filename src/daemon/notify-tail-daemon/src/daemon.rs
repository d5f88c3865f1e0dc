//! Core daemon implementation
//! Wires configuration, the inotify source and the configured sink together

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use notify_tail_core::TailStats;
use notify_tail_system::{
    EventDispatcher, EventSource, InotifySource, LineDelivery, NotificationSink, TailOptions,
    Tailer,
};
use tracing::{debug, info};

use crate::config::TailConfig;
use crate::sink::build_sink;

/// Main daemon orchestrator
pub struct Daemon<S = InotifySource, K = Box<dyn NotificationSink>> {
    dispatcher: EventDispatcher<S, K>,
}

impl Daemon {
    /// Create the event source and sink described by `config` and start
    /// tracking every path
    pub fn new(config: &TailConfig, paths: &[PathBuf]) -> Result<Self> {
        let source = InotifySource::with_buffer_size(config.tail.event_buffer_size)
            .context("inotify not available")?;
        let sink = build_sink(&config.notification);
        Self::with_parts(config, paths, source, sink)
    }
}

impl<S: EventSource, K: NotificationSink> Daemon<S, K> {
    pub fn with_parts(config: &TailConfig, paths: &[PathBuf], source: S, sink: K) -> Result<Self> {
        if paths.is_empty() {
            bail!("No files to watch");
        }
        config.validate()?;

        let delivery = LineDelivery::new(sink).with_style(
            config.notification.urgency,
            Duration::from_millis(config.notification.timeout_ms),
        );
        let options = TailOptions {
            line_buffer_size: config.tail.line_buffer_size,
            from_start: config.tail.from_start,
        };

        let mut tailer = Tailer::new(source, delivery, options);
        for path in paths {
            let id = tailer.track(path);
            let watching = tailer.entry(id).is_some_and(|entry| entry.is_watching());
            debug!(path = %path.display(), watching, "Tracking");
        }

        let registry = tailer.registry();
        info!(
            files = paths.len(),
            directories = registry.directory_count(),
            watches = registry.bound_handles(),
            "Daemon initialized"
        );

        let dispatcher =
            EventDispatcher::new(tailer).with_max_source_errors(config.tail.max_source_errors);
        Ok(Self { dispatcher })
    }

    /// Run until the event source gives up
    pub fn run(mut self) -> Result<()> {
        info!("Starting notify-tail v{}", env!("CARGO_PKG_VERSION"));
        self.dispatcher.run()
    }

    pub fn run_once(&mut self) -> Result<usize> {
        Ok(self.dispatcher.run_once()?)
    }

    pub fn stats(&self) -> &TailStats {
        self.dispatcher.tailer().stats()
    }

    pub fn sink(&self) -> &K {
        self.dispatcher.tailer().delivery().sink()
    }
}
