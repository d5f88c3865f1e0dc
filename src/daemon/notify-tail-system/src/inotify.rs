//! inotify-backed event source

use std::ffi::{CString, OsStr};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use notify_tail_core::{Event, EventKind, WatchHandle};
use tracing::{debug, warn};

use crate::source::EventSource;

/// Size of the fixed part of a kernel event record
const EVENT_HEADER_SIZE: usize = 16;
const NAME_MAX: usize = 255;

/// Smallest read buffer guaranteed to hold one record
pub const MIN_EVENT_BUFFER_SIZE: usize = EVENT_HEADER_SIZE + NAME_MAX + 1;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 4096;

/// Blocking inotify instance
#[derive(Debug)]
pub struct InotifySource {
    fd: OwnedFd,
    buffer: Vec<u8>,
}

impl InotifySource {
    pub fn new() -> io::Result<Self> {
        Self::with_buffer_size(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Buffer sizes below [`MIN_EVENT_BUFFER_SIZE`] are raised to it.
    pub fn with_buffer_size(size: usize) -> io::Result<Self> {
        // SAFETY: no pointers are passed; the result is checked below
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: inotify_init1 returned a fresh descriptor that nothing else owns
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        debug!(fd = fd.as_raw_fd(), "Created inotify instance");
        Ok(Self {
            fd,
            buffer: vec![0u8; size.max(MIN_EVENT_BUFFER_SIZE)],
        })
    }

    fn read_raw(&mut self) -> io::Result<usize> {
        loop {
            // SAFETY: the pointer and length describe `self.buffer`, which is
            // exclusively borrowed for the duration of the call
            let ret = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    self.buffer.as_mut_ptr() as *mut libc::c_void,
                    self.buffer.len(),
                )
            };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl EventSource for InotifySource {
    fn add_watch(&mut self, path: &Path, interest: EventKind) -> io::Result<WatchHandle> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: `c_path` is a NUL terminated string that outlives the call
        let wd = unsafe {
            libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), interest.bits())
        };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WatchHandle(wd))
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        // SAFETY: plain integer arguments; a stale handle only yields EINVAL
        let ret = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), handle.0) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_batch(&mut self) -> io::Result<Vec<Event>> {
        let length = self.read_raw()?;
        let batch = decode_events(&self.buffer[..length]);

        if batch.consumed != length {
            warn!(
                "inotify batch of {} bytes, but decoded {} bytes; discarding the rest",
                length, batch.consumed
            );
        }
        Ok(batch.events)
    }
}

/// Events decoded from one raw read
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<Event>,
    /// Bytes covered by complete records
    pub consumed: usize,
}

/// Decode packed `inotify_event` records. Decoding stops at the first record
/// that does not fit in `bytes`.
pub fn decode_events(bytes: &[u8]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    let mut pos = 0;

    while pos + EVENT_HEADER_SIZE <= bytes.len() {
        let header = &bytes[pos..pos + EVENT_HEADER_SIZE];
        let wd = read_u32(header, 0) as i32;
        let mask = read_u32(header, 4);
        let name_len = read_u32(header, 12) as usize;

        let end = pos + EVENT_HEADER_SIZE + name_len;
        if end > bytes.len() {
            break;
        }

        // The name is NUL padded up to `len`
        let name = bytes[pos + EVENT_HEADER_SIZE..end]
            .split(|&b| b == 0)
            .next()
            .filter(|name| !name.is_empty())
            .map(|name| OsStr::from_bytes(name).to_os_string());

        batch.events.push(Event {
            handle: WatchHandle(wd),
            name,
            kinds: EventKind::from_bits_retain(mask),
        });
        pos = end;
    }

    batch.consumed = pos;
    batch
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(wd: i32, mask: u32, name: &str) -> Vec<u8> {
        let padded = if name.is_empty() {
            0
        } else {
            (name.len() + 1).next_multiple_of(16)
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&wd.to_ne_bytes());
        bytes.extend_from_slice(&mask.to_ne_bytes());
        bytes.extend_from_slice(&0u32.to_ne_bytes());
        bytes.extend_from_slice(&(padded as u32).to_ne_bytes());
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.resize(padded, 0);
        bytes.extend_from_slice(&name_bytes);
        bytes
    }

    #[test]
    fn test_layout_matches_kernel_abi() {
        assert_eq!(std::mem::size_of::<libc::inotify_event>(), EVENT_HEADER_SIZE);
        assert_eq!(EventKind::MODIFY.bits(), libc::IN_MODIFY);
        assert_eq!(EventKind::MOVED_TO.bits(), libc::IN_MOVED_TO);
        assert_eq!(EventKind::CREATE.bits(), libc::IN_CREATE);
        assert_eq!(EventKind::DELETE_SELF.bits(), libc::IN_DELETE_SELF);
        assert_eq!(EventKind::MOVE_SELF.bits(), libc::IN_MOVE_SELF);
        assert_eq!(EventKind::UNMOUNT.bits(), libc::IN_UNMOUNT);
        assert_eq!(EventKind::Q_OVERFLOW.bits(), libc::IN_Q_OVERFLOW);
        assert_eq!(EventKind::IGNORED.bits(), libc::IN_IGNORED);
        assert_eq!(EventKind::ISDIR.bits(), libc::IN_ISDIR);
    }

    #[test]
    fn test_decode_batch() {
        let mut bytes = record(1, libc::IN_MODIFY, "");
        bytes.extend(record(2, libc::IN_CREATE, "log.txt"));

        let batch = decode_events(&bytes);
        assert_eq!(batch.consumed, bytes.len());
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0], Event::new(WatchHandle(1), EventKind::MODIFY));
        assert_eq!(
            batch.events[1],
            Event::new(WatchHandle(2), EventKind::CREATE).with_name("log.txt")
        );
    }

    #[test]
    fn test_decode_truncated_tail() {
        let mut bytes = record(1, libc::IN_MODIFY, "");
        let first = bytes.len();
        let second = record(2, libc::IN_CREATE, "some-name");
        bytes.extend_from_slice(&second[..EVENT_HEADER_SIZE + 3]);

        let batch = decode_events(&bytes);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.consumed, first);
    }

    #[test]
    fn test_decode_keeps_unknown_bits() {
        let bytes = record(4, libc::IN_MODIFY | libc::IN_ACCESS, "");
        let batch = decode_events(&bytes);
        assert_eq!(batch.events[0].kinds.bits(), libc::IN_MODIFY | libc::IN_ACCESS);
    }

    #[test]
    fn test_inotify_reports_created_file() {
        let dir = tempdir().unwrap();
        let mut source = InotifySource::new().unwrap();
        let handle = source
            .add_watch(dir.path(), EventKind::DIRECTORY_INTEREST)
            .unwrap();

        std::fs::write(dir.path().join("log.txt"), b"hello\n").unwrap();

        let events = source.read_batch().unwrap();
        let created = events
            .iter()
            .find(|e| e.kinds.contains(EventKind::CREATE))
            .expect("create event");
        assert_eq!(created.handle, handle);
        assert_eq!(created.name.as_deref(), Some(OsStr::new("log.txt")));

        source.remove_watch(handle).unwrap();
    }

    #[test]
    fn test_watch_on_missing_path_fails() {
        let dir = tempdir().unwrap();
        let mut source = InotifySource::new().unwrap();
        let err = source
            .add_watch(&dir.path().join("missing"), EventKind::FILE_INTEREST)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
