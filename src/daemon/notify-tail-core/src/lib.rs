//! notify-tail core
//!
//! Data model shared by the event loop: the line assembler that turns raw
//! reads into lines, the per-path watch entries, and the registry that owns
//! them. Nothing in this crate talks to the kernel.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod entry;
pub mod event;
pub mod line;
pub mod registry;

pub use entry::{
    normalize_path, parent_dir, ActiveTail, DirectoryWatch, EntryId, EntryKind, FileState,
    FileWatch, WatchEntry, WatchKind,
};
pub use event::{Event, EventKind, WatchHandle};
pub use line::{AssembledLine, LineAssembler, LineEnd};
pub use registry::WatchRegistry;

/// Default line buffer capacity in bytes
pub const DEFAULT_LINE_BUFFER_SIZE: usize = 4096;

/// Errors raised while managing watches
#[derive(Error, Debug)]
pub enum TailError {
    #[error("Could not open '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("Failed to add watch for '{}': {source}", path.display())]
    AddWatch { path: PathBuf, source: io::Error },
    #[error("Failed to remove watch {handle}: {source}")]
    RemoveWatch { handle: WatchHandle, source: io::Error },
    #[error("Error while reading from '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Could not seek in '{}': {source}", path.display())]
    Seek { path: PathBuf, source: io::Error },
    #[error("Watch handle {handle} already belongs to '{}'", owner.display())]
    HandleInUse { handle: WatchHandle, owner: PathBuf },
    #[error("Event source failure: {0}")]
    EventSource(#[source] io::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Counters kept by the watch lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailStats {
    pub lines_delivered: u64,
    pub forced_splits: u64,
    pub truncations: u64,
    pub unknown_events: u64,
    pub read_errors: u64,
    pub reinits: u64,
}
