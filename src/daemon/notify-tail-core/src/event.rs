//! Decoded filesystem events

use std::ffi::OsString;
use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Event kinds reported for a watch. Bit values follow the Linux
    /// inotify ABI so raw masks convert without translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKind: u32 {
        const MODIFY = 0x0000_0002;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE_SELF = 0x0000_0400;
        const MOVE_SELF = 0x0000_0800;
        const UNMOUNT = 0x0000_2000;
        const Q_OVERFLOW = 0x0000_4000;
        const IGNORED = 0x0000_8000;
        const ISDIR = 0x4000_0000;
    }
}

impl EventKind {
    /// Subscription used for a file being tailed
    pub const FILE_INTEREST: Self = Self::MODIFY.union(Self::MOVE_SELF).union(Self::DELETE_SELF);
    /// Subscription used for a directory waiting on a child
    pub const DIRECTORY_INTEREST: Self = Self::CREATE.union(Self::MOVED_TO);
    pub const APPEARED: Self = Self::CREATE.union(Self::MOVED_TO);
    pub const GONE: Self = Self::DELETE_SELF.union(Self::MOVE_SELF);
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.bits())
    }
}

/// Opaque identifier of one active kernel subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(pub i32);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded event: which watch fired, the child name for directory
/// events, and the set of kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub handle: WatchHandle,
    pub name: Option<OsString>,
    pub kinds: EventKind,
}

impl Event {
    pub fn new(handle: WatchHandle, kinds: EventKind) -> Self {
        Self {
            handle,
            name: None,
            kinds,
        }
    }

    pub fn with_name(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_sets() {
        assert!(EventKind::FILE_INTEREST.contains(EventKind::MODIFY));
        assert!(EventKind::FILE_INTEREST.contains(EventKind::DELETE_SELF));
        assert!(!EventKind::FILE_INTEREST.contains(EventKind::CREATE));
        assert_eq!(
            EventKind::DIRECTORY_INTEREST,
            EventKind::CREATE | EventKind::MOVED_TO
        );
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let kinds = EventKind::from_bits_retain(0x0000_0002 | 0x0000_0008);
        assert!(kinds.contains(EventKind::MODIFY));
        let rest = kinds.difference(EventKind::MODIFY);
        assert_eq!(rest.bits(), 0x8);
        assert_eq!(rest.to_string(), "0x00000008");
    }
}
