use crate::types::LogIndex;
use std::{fmt, io};

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq)]
struct U64NonZero(u64);

impl U64NonZero {
    fn new(val: u64) -> Self {
        assert_ne!(val, 0);
        U64NonZero(val)
    }
}

/// Index is an index of an entry in the log; i.e. a log entry's index.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq)]
pub(crate) struct Index(U64NonZero);

impl Index {
    pub(crate) fn new(index: u64) -> Self {
        Index(U64NonZero::new(index))
    }

    pub(crate) fn start_index() -> Self {
        Self::new(1)
    }

    pub(crate) fn as_u64(&self) -> u64 {
        self.0 .0
    }

    pub(crate) fn plus(&self, delta: u64) -> Index {
        Index::new(self.as_u64() + delta)
    }

    /// Converts a public `LogIndex`. Index 0 doesn't name an entry, so it has no `Index`.
    pub(crate) fn from_log_index(index: LogIndex) -> Option<Index> {
        if index.is_zero() {
            None
        } else {
            Some(Index::new(index.as_u64()))
        }
    }

    pub(crate) fn as_log_index(&self) -> LogIndex {
        LogIndex::new(self.as_u64())
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 .0)
    }
}

/// Log is an append only log intended for use as a replicated commit log in a database.
///
/// Log indexes entries starting from 1. There will be no entry existing at index 0. The first
/// entry is written at index 1.
pub(crate) trait Log<E: Entry> {
    /// append() appends a log entry to the log at the next log entry index, then returns
    /// the log entry index that was just used to append the entry.
    fn append(&mut self, entry: E) -> Result<Index, io::Error>;

    /// Read log entry at specified index. Entries that were compacted away read as `None`.
    fn read(&self, index: Index) -> Result<Option<E>, io::Error>;

    /// Soft-deletes anything starting at `index` and later. Soft-deletion makes this infallible.
    fn truncate(&mut self, index: Index);

    /// Releases every entry up to and including `index`. Afterwards `first_index()` is `index + 1`.
    fn compact(&mut self, index: Index);

    /// first_index returns the lowest index that can still be read.
    fn first_index(&self) -> Index;

    /// next_index returns the next index that will be used to append an entry.
    fn next_index(&self) -> Index;
}

// Choice of Vec<u8> vs Bytes will depend on whats easier for disk to use.
pub(crate) trait Entry: Clone + From<Vec<u8>> + Into<Vec<u8>> {}
