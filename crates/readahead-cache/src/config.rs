/// Tuning for a [`ReadAhead`](crate::ReadAhead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAheadConfig {
    /// Minimum number of units fetched on a miss.
    pub readahead_size: u16,
}

impl Default for ReadAheadConfig {
    fn default() -> Self {
        Self { readahead_size: 64 }
    }
}

impl ReadAheadConfig {
    pub fn with_readahead_size(mut self, readahead_size: u16) -> Self {
        self.readahead_size = readahead_size;
        self
    }
}
