use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LogId identifies a replicated log, and with it the replicated state built on top of it.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LogId(u64);

impl LogId {
    pub fn new(id: u64) -> Self {
        LogId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(LogId)
    }
}

/// LogIndex is the position of an entry in a replicated log. The first entry lives at index 1.
/// Index 0 is never assigned to an entry; it means "nothing yet" (e.g. nothing applied).
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogIndex(u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn new(index: u64) -> Self {
        LogIndex(index)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn next(&self) -> LogIndex {
        LogIndex(self.0 + 1)
    }

    pub fn saturating_prev(&self) -> LogIndex {
        LogIndex(self.0.saturating_sub(1))
    }
}

impl fmt::Debug for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// LogTerm is the election epoch of a replicated log.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct LogTerm(u64);

impl LogTerm {
    pub fn new(term: u64) -> Self {
        LogTerm(term)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn incr(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Debug for LogTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// ServerId names a node in the cluster.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ServerId(String);

impl ServerId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        ServerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        ServerId::new(id)
    }
}
