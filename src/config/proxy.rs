//! PROXY Protocol Configuration
//!
//! Configuration types for PROXY protocol v2 header decoding.

use serde::Deserialize;
use std::time::Duration;

use crate::proxy::{ReadMode, ReaderOptions, DEFAULT_CHUNK_SIZE, MAX_HEADER_SIZE};

/// PROXY protocol configuration for a listener
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyProtocolConfig {
    /// Expect a PROXY v2 header on every accepted connection
    pub enabled: bool,

    /// Decode the header even when the 12-byte signature does not match.
    pub allow_wrong_magic: bool,

    /// Reject headers with an unassigned version or command nibble
    pub strict: bool,

    /// Keep reading until the whole header has arrived instead of
    /// decoding the first read only.
    pub accumulate: bool,

    /// Upper bound on header size when accumulating.
    /// Default: 536 bytes
    pub max_header_size: usize,

    /// Bytes requested per socket read
    pub chunk_size: usize,

    /// Timeout for reading PROXY header in seconds.
    /// Default: 5 seconds
    pub timeout: u64,
}

impl Default for ProxyProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_wrong_magic: false,
            strict: false,
            accumulate: false,
            max_header_size: MAX_HEADER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: 5,
        }
    }
}

impl ProxyProtocolConfig {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn reader_options(&self) -> ReaderOptions {
        let mode = if self.accumulate {
            ReadMode::Accumulate {
                max_header_size: self.max_header_size,
            }
        } else {
            ReadMode::SingleChunk
        };

        ReaderOptions {
            allow_wrong_magic: self.allow_wrong_magic,
            strict: self.strict,
            mode,
        }
    }
}
