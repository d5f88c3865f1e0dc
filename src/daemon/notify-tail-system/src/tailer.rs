//! Watch lifecycle
//!
//! Moves file entries between `Unwatched` and `Watching` as files appear,
//! disappear, get truncated or get replaced, and keeps one directory watch
//! per parent directory so that a missing file is picked up the moment it
//! is created.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use notify_tail_core::{
    parent_dir, ActiveTail, EntryId, EntryKind, EventKind, FileState, LineAssembler, TailError,
    TailStats, WatchEntry, WatchHandle, WatchRegistry, DEFAULT_LINE_BUFFER_SIZE,
};
use tracing::{debug, error, info, warn};

use crate::sink::{LineDelivery, NotificationSink};
use crate::source::EventSource;

/// Where reading starts after a file is (re)opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    /// Skip existing content
    End,
    /// Read everything already in the file
    Beginning,
}

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub line_buffer_size: usize,
    /// Show existing content of files present at startup
    pub from_start: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            line_buffer_size: DEFAULT_LINE_BUFFER_SIZE,
            from_start: false,
        }
    }
}

/// Owns the registry, the event source and the output for one run
pub struct Tailer<S, K> {
    source: S,
    delivery: LineDelivery<K>,
    registry: WatchRegistry,
    options: TailOptions,
    stats: TailStats,
}

impl<S: EventSource, K: NotificationSink> Tailer<S, K> {
    pub fn new(source: S, delivery: LineDelivery<K>, options: TailOptions) -> Self {
        Self {
            source,
            delivery,
            registry: WatchRegistry::new(),
            options,
            stats: TailStats::default(),
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &TailStats {
        &self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn delivery(&self) -> &LineDelivery<K> {
        &self.delivery
    }

    pub fn entry(&self, id: EntryId) -> Option<&WatchEntry> {
        self.registry.get(id)
    }

    pub(crate) fn note_unknown_event(&mut self) {
        self.stats.unknown_events += 1;
    }

    /// Start tracking a file for the rest of the run. A path that does not
    /// exist yet stays `Unwatched` until its directory reports it.
    pub fn track(&mut self, path: impl AsRef<Path>) -> EntryId {
        let id = self.registry.insert_file(path);
        let start = if self.options.from_start {
            StartAt::Beginning
        } else {
            StartAt::End
        };
        self.reinit(id, start);
        id
    }

    /// (Re)open a file entry and subscribe to it. Returns true when the entry
    /// ends up `Watching`.
    pub fn reinit(&mut self, id: EntryId, start: StartAt) -> bool {
        let Some(path) = self.file_path(id) else {
            return false;
        };

        self.release(id);
        self.wait_for_parent(id);

        let tail = match self.open_tail(&path, start) {
            Ok(tail) => tail,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        let handle = tail.handle;
        if let Err(e) = self.registry.bind_handle(id, handle) {
            // The handle is shared with another entry, so leave the kernel watch alone
            warn!("Not tailing '{}': {}", path.display(), e);
            return false;
        }

        let offset = tail.offset;
        if let Some(file) = self.registry.get_mut(id).and_then(WatchEntry::as_file_mut) {
            file.state = FileState::Watching(tail);
        }
        self.stats.reinits += 1;
        info!(handle = %handle, offset, "Watching '{}'", path.display());

        if start == StartAt::Beginning {
            self.read_watch(id);
        }
        true
    }

    fn open_tail(&mut self, path: &Path, start: StartAt) -> Result<ActiveTail, TailError> {
        let mut file = File::open(path).map_err(|source| TailError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let handle = self
            .source
            .add_watch(path, EventKind::FILE_INTEREST)
            .map_err(|source| TailError::AddWatch {
                path: path.to_path_buf(),
                source,
            })?;

        let offset = match start {
            StartAt::Beginning => 0,
            StartAt::End => match file.seek(SeekFrom::End(0)) {
                Ok(offset) => offset,
                Err(source) => {
                    self.remove_watch(handle);
                    return Err(TailError::Seek {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            },
        };

        Ok(ActiveTail {
            handle,
            file,
            offset,
            buffer: LineAssembler::with_capacity(self.options.line_buffer_size),
        })
    }

    /// Link a file entry to the directory watch for its parent, creating the
    /// directory entry on first use and retrying its subscription if an
    /// earlier attempt failed.
    fn wait_for_parent(&mut self, id: EntryId) {
        let Some(entry) = self.registry.get(id) else {
            return;
        };
        let Some(parent) = entry.as_file().map(|file| file.parent) else {
            return;
        };
        let path = entry.path().to_path_buf();

        let dir_id = match parent {
            Some(dir_id) => dir_id,
            None => {
                let Some(dir_path) = parent_dir(&path) else {
                    debug!("'{}' has no parent directory to watch", path.display());
                    return;
                };
                let dir_id = self.registry.insert_directory(&dir_path);
                if let Some(file) = self.registry.get_mut(id).and_then(WatchEntry::as_file_mut) {
                    file.parent = Some(dir_id);
                }
                let dir = self.registry.get_mut(dir_id);
                if let Some(dir) = dir.and_then(WatchEntry::as_directory_mut) {
                    dir.dependents += 1;
                }
                dir_id
            }
        };

        let Some(dir_entry) = self.registry.get(dir_id) else {
            return;
        };
        if dir_entry.handle().is_some() {
            return;
        }
        let dir_path = dir_entry.path().to_path_buf();

        let handle = match self.source.add_watch(&dir_path, EventKind::DIRECTORY_INTEREST) {
            Ok(handle) => handle,
            Err(source) => {
                warn!("{}", TailError::AddWatch { path: dir_path, source });
                return;
            }
        };
        if let Err(e) = self.registry.bind_handle(dir_id, handle) {
            warn!("Not watching directory '{}': {}", dir_path.display(), e);
            return;
        }
        if let Some(dir) = self.registry.get_mut(dir_id).and_then(WatchEntry::as_directory_mut) {
            dir.handle = Some(handle);
        }
        debug!(handle = %handle, "Watching directory '{}'", dir_path.display());
    }

    /// Drop the subscription and descriptor of an entry. Returns true if the
    /// entry was subscribed. A kernel watch still shared with another
    /// directory entry stays in place.
    fn release(&mut self, id: EntryId) -> bool {
        match self.take_handle(id) {
            Some((handle, true)) => {
                self.remove_watch(handle);
                true
            }
            Some((_, false)) => true,
            None => false,
        }
    }

    /// Detach the handle from an entry without touching the kernel watch.
    /// The flag tells whether that was the last entry holding the handle.
    fn take_handle(&mut self, id: EntryId) -> Option<(WatchHandle, bool)> {
        let entry = self.registry.get_mut(id)?;
        let path = entry.path().to_path_buf();
        let handle = match &mut entry.kind {
            EntryKind::File(file) => match std::mem::take(&mut file.state) {
                FileState::Watching(tail) => {
                    if !tail.buffer.is_empty() {
                        debug!(
                            bytes = tail.buffer.len(),
                            "Discarding partial line of '{}'",
                            path.display()
                        );
                    }
                    tail.handle
                }
                FileState::Unwatched => return None,
            },
            EntryKind::Directory(dir) => dir.handle.take()?,
        };
        let last = self.registry.unbind_handle(handle, id);
        Some((handle, last))
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        if let Err(source) = self.source.remove_watch(handle) {
            // Expected when the kernel already dropped the watch
            debug!("{}", TailError::RemoveWatch { handle, source });
        }
    }

    /// The watched path went away (deleted or moved).
    pub fn file_deleted(&mut self, id: EntryId) {
        let Some(entry) = self.registry.get(id) else {
            return;
        };
        let path = entry.path().to_path_buf();
        let is_file = entry.as_file().is_some();

        if !self.release(id) {
            return;
        }
        if is_file {
            info!("'{}' is gone, waiting for it to reappear", path.display());
            self.wait_for_parent(id);
        } else {
            warn!(
                "Directory '{}' is gone, files inside it are no longer picked up",
                path.display()
            );
        }
    }

    /// The kernel dropped a watch on its own.
    pub fn watch_dropped(&mut self, id: EntryId) {
        if let Some((handle, _)) = self.take_handle(id) {
            if let Some(entry) = self.registry.get(id) {
                debug!(handle = %handle, "Watch on '{}' was removed", entry.path().display());
            }
        }
    }

    /// `name` was created in, or moved into, the directory of `dir_id`.
    pub fn file_appeared(&mut self, dir_id: EntryId, name: &OsStr) {
        if self.registry.get(dir_id).and_then(WatchEntry::as_directory).is_none() {
            debug!("Create event for '{}' on a file watch", name.to_string_lossy());
            return;
        }

        for id in self.registry.files_matching(dir_id, name) {
            let Some(entry) = self.registry.get(id) else {
                continue;
            };
            let path = entry.path().to_path_buf();

            match entry.as_file().and_then(|file| file.state.active()) {
                None => {
                    info!("'{}' appeared", path.display());
                    self.reinit(id, StartAt::Beginning);
                }
                Some(tail) if was_replaced(&path, &tail.file) => {
                    info!("'{}' was replaced", path.display());
                    // Pick up whatever was appended to the old file first
                    self.read_watch(id);
                    self.reinit(id, StartAt::Beginning);
                }
                Some(_) => debug!("'{}' is already watched", path.display()),
            }
        }
    }

    /// Read everything appended since the last read and deliver the lines.
    pub fn read_watch(&mut self, id: EntryId) {
        let Some(entry) = self.registry.get_mut(id) else {
            return;
        };
        let path = entry.path().to_path_buf();

        let Some(tail) = entry.as_file_mut().and_then(|file| file.state.active_mut()) else {
            debug!("Modify event for '{}' which is not being tailed", path.display());
            return;
        };

        drain(&path, tail, &mut self.delivery, &mut self.stats);
    }

    /// Recover after lost events: drain every open file, retry every missing
    /// one and resubscribe parent directories of files still absent.
    pub fn resync(&mut self) {
        for id in self.registry.file_ids() {
            let Some(entry) = self.registry.get(id) else {
                continue;
            };
            if entry.is_watching() {
                self.read_watch(id);
            } else if entry.path().exists() {
                self.reinit(id, StartAt::Beginning);
            } else {
                self.wait_for_parent(id);
            }
        }
    }

    fn file_path(&self, id: EntryId) -> Option<PathBuf> {
        self.registry
            .get(id)
            .filter(|entry| entry.as_file().is_some())
            .map(|entry| entry.path().to_path_buf())
    }
}

/// True when `path` now names a different inode than the open `file`.
fn was_replaced(path: &Path, file: &File) -> bool {
    match (std::fs::metadata(path), file.metadata()) {
        (Ok(current), Ok(open)) => current.dev() != open.dev() || current.ino() != open.ino(),
        _ => false,
    }
}

fn drain<K: NotificationSink>(
    path: &Path,
    tail: &mut ActiveTail,
    delivery: &mut LineDelivery<K>,
    stats: &mut TailStats,
) {
    match tail.file.metadata() {
        Ok(meta) if meta.len() < tail.offset => {
            warn!("'{}' was truncated, reading whole file again", path.display());
            stats.truncations += 1;
            if let Err(source) = tail.file.seek(SeekFrom::Start(0)) {
                error!("{}", TailError::Seek { path: path.to_path_buf(), source });
                return;
            }
            tail.offset = 0;
            tail.buffer.reset();
        }
        Ok(_) => {}
        Err(e) => debug!("Could not stat '{}': {}", path.display(), e),
    }

    loop {
        let read = tail.file.read(tail.buffer.spare_mut());
        match read {
            Ok(0) => break,
            Ok(n) => {
                for line in tail.buffer.commit(n) {
                    if line.is_forced() {
                        warn!(
                            "'{}': Line longer than {} bytes, splitting up",
                            path.display(),
                            tail.buffer.capacity() - 1
                        );
                        stats.forced_splits += 1;
                    }
                    if delivery.deliver(path, &line.bytes) {
                        stats.lines_delivered += 1;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                error!("{}", TailError::Read { path: path.to_path_buf(), source });
                stats.read_errors += 1;
                break;
            }
        }
    }

    match tail.file.stream_position() {
        Ok(offset) => tail.offset = offset,
        Err(source) => warn!("{}", TailError::Seek { path: path.to_path_buf(), source }),
    }
}
