//! Registry of every tracked path
//!
//! Entries live in an append-only arena and are addressed by [`EntryId`].
//! Side indexes map live kernel handles and paths back to entries. A file
//! handle has exactly one owner; directory entries whose paths name the same
//! directory share its handle.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::entry::{is_child_of, normalize_path, EntryId, WatchEntry, WatchKind};
use crate::event::WatchHandle;
use crate::TailError;

#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: Vec<WatchEntry>,
    by_handle: HashMap<WatchHandle, Vec<EntryId>>,
    files: HashMap<PathBuf, EntryId>,
    directories: HashMap<PathBuf, EntryId>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a file path. Adding the same path twice returns the first entry.
    pub fn insert_file(&mut self, path: impl AsRef<Path>) -> EntryId {
        let entry = WatchEntry::file(path);
        if let Some(&id) = self.files.get(entry.path()) {
            return id;
        }
        self.push(entry)
    }

    /// Track a directory path. Idempotent per path.
    pub fn insert_directory(&mut self, path: impl AsRef<Path>) -> EntryId {
        let entry = WatchEntry::directory(path);
        if let Some(&id) = self.directories.get(entry.path()) {
            return id;
        }
        self.push(entry)
    }

    fn push(&mut self, entry: WatchEntry) -> EntryId {
        let id = EntryId(self.entries.len());
        let index = match entry.watch_kind() {
            WatchKind::File => &mut self.files,
            WatchKind::Directory => &mut self.directories,
        };
        index.insert(entry.path().to_path_buf(), id);
        self.entries.push(entry);
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&WatchEntry> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut WatchEntry> {
        self.entries.get_mut(id.0)
    }

    /// First entry bound to `handle`
    pub fn by_handle(&self, handle: WatchHandle) -> Option<EntryId> {
        self.by_handle.get(&handle).and_then(|owners| owners.first().copied())
    }

    /// Every entry bound to `handle`, in binding order
    pub fn entries_for(&self, handle: WatchHandle) -> Vec<EntryId> {
        self.by_handle.get(&handle).cloned().unwrap_or_default()
    }

    pub fn is_bound(&self, id: EntryId, handle: WatchHandle) -> bool {
        self.by_handle
            .get(&handle)
            .is_some_and(|owners| owners.contains(&id))
    }

    pub fn find_file(&self, path: &Path) -> Option<EntryId> {
        self.files.get(&normalize_path(path)).copied()
    }

    pub fn find_directory(&self, path: &Path) -> Option<EntryId> {
        self.directories.get(&normalize_path(path)).copied()
    }

    /// Record that `handle` now belongs to `id`.
    ///
    /// Two paths can resolve to the same inode. Directory entries then share
    /// the handle; any other overlap fails with [`TailError::HandleInUse`].
    pub fn bind_handle(&mut self, id: EntryId, handle: WatchHandle) -> Result<(), TailError> {
        let owners = self.by_handle.get(&handle).map(Vec::as_slice).unwrap_or_default();
        if owners.contains(&id) {
            return Ok(());
        }

        let shareable = self.is_directory(id) && owners.iter().all(|&o| self.is_directory(o));
        if let (Some(&owner), false) = (owners.first(), shareable) {
            let owner_path = self
                .get(owner)
                .map(|entry| entry.path().to_path_buf())
                .unwrap_or_default();
            return Err(TailError::HandleInUse { handle, owner: owner_path });
        }

        self.by_handle.entry(handle).or_default().push(id);
        Ok(())
    }

    /// Detach `id` from `handle`. Returns true when no entry holds the handle
    /// any more.
    pub fn unbind_handle(&mut self, handle: WatchHandle, id: EntryId) -> bool {
        let Some(owners) = self.by_handle.get_mut(&handle) else {
            return true;
        };
        owners.retain(|&owner| owner != id);
        if owners.is_empty() {
            self.by_handle.remove(&handle);
            true
        } else {
            false
        }
    }

    fn is_directory(&self, id: EntryId) -> bool {
        self.get(id)
            .is_some_and(|entry| entry.watch_kind() == WatchKind::Directory)
    }

    /// File entries that `name` appearing inside directory `dir` refers to
    pub fn files_matching(&self, dir: EntryId, name: &OsStr) -> Vec<EntryId> {
        let Some(dir_path) = self.get(dir).map(WatchEntry::path) else {
            return Vec::new();
        };
        self.iter()
            .filter(|(_, entry)| entry.watch_kind() == WatchKind::File)
            .filter(|(_, entry)| is_child_of(entry.path(), dir_path, name))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn file_ids(&self) -> Vec<EntryId> {
        self.iter()
            .filter(|(_, entry)| entry.watch_kind() == WatchKind::File)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &WatchEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (EntryId(index), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn bound_handles(&self) -> usize {
        self.by_handle.len()
    }
}
