//! Event dispatch
//!
//! The single driver of the process: blocks on the event source, then routes
//! every decoded event to the watch lifecycle.

use anyhow::{Context, Result};
use notify_tail_core::{EntryId, Event, EventKind, TailError};
use tracing::{debug, error, info, warn};

use crate::sink::NotificationSink;
use crate::source::EventSource;
use crate::tailer::Tailer;

/// Consecutive failed batch reads tolerated before giving up
pub const DEFAULT_MAX_SOURCE_ERRORS: u32 = 16;

pub struct EventDispatcher<S, K> {
    tailer: Tailer<S, K>,
    max_source_errors: u32,
}

impl<S: EventSource, K: NotificationSink> EventDispatcher<S, K> {
    pub fn new(tailer: Tailer<S, K>) -> Self {
        Self {
            tailer,
            max_source_errors: DEFAULT_MAX_SOURCE_ERRORS,
        }
    }

    pub fn with_max_source_errors(mut self, max: u32) -> Self {
        self.max_source_errors = max.max(1);
        self
    }

    pub fn tailer(&self) -> &Tailer<S, K> {
        &self.tailer
    }

    pub fn tailer_mut(&mut self) -> &mut Tailer<S, K> {
        &mut self.tailer
    }

    /// Process batches forever. Only returns once the event source has
    /// failed `max_source_errors` times in a row.
    pub fn run(&mut self) -> Result<()> {
        info!(
            entries = self.tailer.registry().len(),
            "Waiting for filesystem events"
        );

        let mut failures = 0u32;
        loop {
            match self.run_once() {
                Ok(_) => failures = 0,
                Err(e) => {
                    failures += 1;
                    error!("{} ({}/{})", e, failures, self.max_source_errors);
                    if failures >= self.max_source_errors {
                        return Err(e).context("event source keeps failing, giving up");
                    }
                }
            }
        }
    }

    /// Read one batch and dispatch all of it. Returns the number of events.
    pub fn run_once(&mut self) -> Result<usize, TailError> {
        let events = self
            .tailer
            .source_mut()
            .read_batch()
            .map_err(TailError::EventSource)?;

        for event in &events {
            self.dispatch(event);
        }

        debug!(events = events.len(), stats = ?self.tailer.stats(), "Batch done");
        Ok(events.len())
    }

    /// Route one event. Kind bits are handled independently in a fixed
    /// order: modify, create/moved-to, delete/move-self, ignored.
    pub fn dispatch(&mut self, event: &Event) {
        if event.kinds.contains(EventKind::Q_OVERFLOW) {
            warn!("Kernel event queue overflowed, rereading all watches");
            self.tailer.resync();
            return;
        }

        let owners = self.tailer.registry().entries_for(event.handle);
        if owners.is_empty() {
            self.tailer.note_unknown_event();
            if event.kinds == EventKind::IGNORED {
                debug!(handle = %event.handle, "Released watch confirmed");
            } else {
                warn!(
                    "Event {} for unknown watch handle {}",
                    event.kinds, event.handle
                );
            }
            return;
        }

        // Directories reached through different paths share one handle
        for id in owners {
            self.route(id, event);
        }
    }

    fn route(&mut self, id: EntryId, event: &Event) {
        let mut kinds = event.kinds;

        if kinds.contains(EventKind::MODIFY) {
            kinds.remove(EventKind::MODIFY);
            self.tailer.read_watch(id);
        }

        if kinds.intersects(EventKind::APPEARED) {
            let is_dir = kinds.contains(EventKind::ISDIR);
            kinds.remove(EventKind::APPEARED | EventKind::ISDIR);
            match &event.name {
                Some(name) if !is_dir => self.tailer.file_appeared(id, name),
                Some(name) => debug!("Directory '{}' appeared, not a file", name.to_string_lossy()),
                None => debug!(handle = %event.handle, "Create event without a name"),
            }
        }

        if kinds.intersects(EventKind::GONE) {
            kinds.remove(EventKind::GONE);
            self.tailer.file_deleted(id);
        }

        if kinds.contains(EventKind::IGNORED) {
            kinds.remove(EventKind::IGNORED);
            if self.tailer.registry().is_bound(id, event.handle) {
                self.tailer.watch_dropped(id);
            }
        }

        if !kinds.is_empty() {
            let path = self
                .tailer
                .entry(id)
                .map(|entry| entry.path().display().to_string())
                .unwrap_or_default();
            warn!("Unhandled event {} for '{}'", kinds, path);
        }
    }
}
