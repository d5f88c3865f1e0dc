//! Test doubles for the event source and the notification sink

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use notify_tail_core::{Event, EventKind, WatchHandle};

use crate::sink::{Notification, NotificationSink};
use crate::source::EventSource;

/// Event source that subscribes to real paths but replays scripted batches.
/// Like inotify it refuses missing paths and hands out one handle per inode.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    next_handle: i32,
    pub watches: BTreeMap<WatchHandle, (PathBuf, EventKind)>,
    inodes: HashMap<(u64, u64), WatchHandle>,
    pub removed: Vec<WatchHandle>,
    batches: VecDeque<io::Result<Vec<Event>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    pub fn push_batch(&mut self, events: Vec<Event>) {
        self.batches.push_back(Ok(events));
    }

    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.batches.push_back(Err(io::Error::from(kind)));
    }

    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.watches
            .iter()
            .find(|(_, (watched, _))| watched == path)
            .map(|(handle, _)| *handle)
    }
}

impl EventSource for ScriptedSource {
    fn add_watch(&mut self, path: &Path, interest: EventKind) -> io::Result<WatchHandle> {
        let meta = std::fs::metadata(path)?;
        let inode = (meta.dev(), meta.ino());

        if let Some(&handle) = self.inodes.get(&inode) {
            if self.watches.contains_key(&handle) {
                return Ok(handle);
            }
        }

        let handle = WatchHandle(self.next_handle.max(1));
        self.next_handle = handle.0 + 1;
        self.watches.insert(handle, (path.to_path_buf(), interest));
        self.inodes.insert(inode, handle);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        match self.watches.remove(&handle) {
            Some(_) => {
                self.inodes.retain(|_, h| *h != handle);
                self.removed.push(handle);
                Ok(())
            }
            None => Err(io::Error::from_raw_os_error(libc::EINVAL)),
        }
    }

    fn read_batch(&mut self) -> io::Result<Vec<Event>> {
        self.batches.pop_front().unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "script exhausted",
            ))
        })
    }
}

/// Sink that remembers everything it was asked to show
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub shown: Vec<Notification>,
    pub attempts: usize,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<&str> {
        self.shown.iter().map(|n| n.message.as_str()).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&mut self, notification: &Notification) -> Result<()> {
        self.attempts += 1;
        if self.fail {
            bail!("display unavailable");
        }
        self.shown.push(notification.clone());
        Ok(())
    }
}
