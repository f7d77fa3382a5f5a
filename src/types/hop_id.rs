// ABOUTME: Identity of a hop within a tunnel chain.
// ABOUTME: Attached to every chain error so callers know where it failed.

use std::fmt;

/// Position (1-based, destination last) and host of one hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HopId {
    index: usize,
    host: String,
}

impl HopId {
    pub fn new(index: usize, host: impl Into<String>) -> Self {
        Self {
            index,
            host: host.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for HopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hop {} ({})", self.index, self.host)
    }
}
