//! Watch entries: the durable record of one tracked path

use std::fmt;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use crate::event::WatchHandle;
use crate::line::LineAssembler;

/// Stable index of an entry inside a [`crate::WatchRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    File,
    Directory,
}

/// An open file being tailed together with its subscription
#[derive(Debug)]
pub struct ActiveTail {
    pub handle: WatchHandle,
    pub file: File,
    /// Read position; only meaningful for this open lifetime
    pub offset: u64,
    pub buffer: LineAssembler,
}

/// Lifecycle state of a file watch
#[derive(Debug, Default)]
pub enum FileState {
    #[default]
    Unwatched,
    Watching(ActiveTail),
}

impl FileState {
    pub fn is_watching(&self) -> bool {
        matches!(self, FileState::Watching(_))
    }

    pub fn active(&self) -> Option<&ActiveTail> {
        match self {
            FileState::Watching(tail) => Some(tail),
            FileState::Unwatched => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveTail> {
        match self {
            FileState::Watching(tail) => Some(tail),
            FileState::Unwatched => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FileWatch {
    /// Directory entry notified when this file (re)appears
    pub parent: Option<EntryId>,
    pub state: FileState,
}

#[derive(Debug, Default)]
pub struct DirectoryWatch {
    pub handle: Option<WatchHandle>,
    /// Number of file entries linked to this directory
    pub dependents: usize,
}

#[derive(Debug)]
pub enum EntryKind {
    File(FileWatch),
    Directory(DirectoryWatch),
}

#[derive(Debug)]
pub struct WatchEntry {
    path: PathBuf,
    pub kind: EntryKind,
}

impl WatchEntry {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            kind: EntryKind::File(FileWatch::default()),
        }
    }

    pub fn directory(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            kind: EntryKind::Directory(DirectoryWatch::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn watch_kind(&self) -> WatchKind {
        match self.kind {
            EntryKind::File(_) => WatchKind::File,
            EntryKind::Directory(_) => WatchKind::Directory,
        }
    }

    /// The live kernel handle, if subscribed
    pub fn handle(&self) -> Option<WatchHandle> {
        match &self.kind {
            EntryKind::File(file) => file.state.active().map(|tail| tail.handle),
            EntryKind::Directory(dir) => dir.handle,
        }
    }

    pub fn as_file(&self) -> Option<&FileWatch> {
        match &self.kind {
            EntryKind::File(file) => Some(file),
            EntryKind::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileWatch> {
        match &mut self.kind {
            EntryKind::File(file) => Some(file),
            EntryKind::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryWatch> {
        match &self.kind {
            EntryKind::Directory(dir) => Some(dir),
            EntryKind::File(_) => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut DirectoryWatch> {
        match &mut self.kind {
            EntryKind::Directory(dir) => Some(dir),
            EntryKind::File(_) => None,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.as_file().is_some_and(|file| file.state.is_watching())
    }

    /// Read offset of a watching file entry
    pub fn offset(&self) -> Option<u64> {
        self.as_file()
            .and_then(|file| file.state.active())
            .map(|tail| tail.offset)
    }
}

/// Collapse redundant separators and interior `.` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Directory whose create events announce `path`. Bare file names resolve to
/// the current directory.
pub fn parent_dir(path: &Path) -> Option<PathBuf> {
    path.file_name()?;
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(PathBuf::from(".")),
        Some(parent) => Some(normalize_path(parent)),
        None => None,
    }
}

/// True when `path` names the child `name` directly inside `dir`.
pub fn is_child_of(path: &Path, dir: &Path, name: &std::ffi::OsStr) -> bool {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    single && path.file_name() == Some(name) && parent_dir(path).as_deref() == Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(
            normalize_path(Path::new("/tmp//logs///app.log")),
            PathBuf::from("/tmp/logs/app.log")
        );
        assert_eq!(normalize_path(Path::new("/tmp/./app.log")), PathBuf::from("/tmp/app.log"));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/tmp/log.txt")), Some(PathBuf::from("/tmp")));
        assert_eq!(parent_dir(Path::new("log.txt")), Some(PathBuf::from(".")));
        assert_eq!(parent_dir(Path::new("/log.txt")), Some(PathBuf::from("/")));
        assert_eq!(parent_dir(Path::new("/")), None);
        assert_eq!(parent_dir(Path::new("logs/..")), None);
    }

    #[test]
    fn test_is_child_of() {
        let path = normalize_path(Path::new("/tmp//log.txt"));
        assert!(is_child_of(&path, Path::new("/tmp"), OsStr::new("log.txt")));
        assert!(!is_child_of(&path, Path::new("/tmp"), OsStr::new("log.txt.1")));
        assert!(!is_child_of(&path, Path::new("/var"), OsStr::new("log.txt")));
        assert!(is_child_of(Path::new("log.txt"), Path::new("."), OsStr::new("log.txt")));
    }

    #[test]
    fn test_new_file_entry_is_unwatched() {
        let entry = WatchEntry::file("/tmp/log.txt");
        assert_eq!(entry.watch_kind(), WatchKind::File);
        assert!(!entry.is_watching());
        assert_eq!(entry.handle(), None);
        assert_eq!(entry.offset(), None);
    }
}
