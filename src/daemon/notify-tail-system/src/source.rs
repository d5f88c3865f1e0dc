//! Abstract filesystem event source

use std::io;
use std::path::Path;

use notify_tail_core::{Event, EventKind, WatchHandle};

/// A kernel change-notification facility.
///
/// Calls are synchronous; `read_batch` blocks until at least one event is
/// available.
pub trait EventSource {
    /// Subscribe to `interest` on `path`. Adding a path whose inode is
    /// already watched returns the existing handle.
    fn add_watch(&mut self, path: &Path, interest: EventKind) -> io::Result<WatchHandle>;

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()>;

    fn read_batch(&mut self) -> io::Result<Vec<Event>>;
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn add_watch(&mut self, path: &Path, interest: EventKind) -> io::Result<WatchHandle> {
        (**self).add_watch(path, interest)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        (**self).remove_watch(handle)
    }

    fn read_batch(&mut self) -> io::Result<Vec<Event>> {
        (**self).read_batch()
    }
}
