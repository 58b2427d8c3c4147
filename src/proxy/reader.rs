//! PROXY Header Stream Reader
//!
//! Reads exactly one PROXY v2 header from a [`ByteSource`] and hands back
//! the decoded header, the client address and any application bytes that
//! arrived in the same read.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use super::address::{decode_address, AddressInfo};
use super::error::ProxyError;
use super::header::{
    parse_header, signature_prefix_matches, DecodeOutcome, Header, FIXED_HEADER_LEN,
};
use super::source::ByteSource;

/// Maximum PROXY header size used when accumulating
pub const MAX_HEADER_SIZE: usize = 536;

/// How many source chunks the reader may consume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Decode the first chunk only. A header split across reads is
    /// reported as `TooShort`.
    #[default]
    SingleChunk,
    /// Keep reading until header and body are complete, the source ends,
    /// or the header would exceed `max_header_size`.
    Accumulate { max_header_size: usize },
}

/// Reader behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Decode even when the signature does not match
    pub allow_wrong_magic: bool,
    /// Reject headers whose version or command nibble is unassigned
    pub strict: bool,
    /// Single read or accumulate
    pub mode: ReadMode,
}

/// Reader lifecycle, a reader decodes at most one header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// `read_header` not called yet
    AwaitingData,
    /// Terminal, whatever the outcome
    Done,
}

/// A successfully decoded header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedHeader {
    /// Decoded fixed part
    pub header: Header,
    /// `None` for every family other than TCP4
    pub address: Option<AddressInfo>,
    /// Bytes past the header that belong to the application stream
    pub remainder: Bytes,
}

impl ProxiedHeader {
    /// Original client address, when the family carries one
    pub fn client_addr(&self) -> Option<std::net::SocketAddr> {
        self.address.as_ref().map(AddressInfo::remote)
    }
}

/// One-shot PROXY v2 header reader
#[derive(Debug)]
pub struct StreamHeaderReader {
    options: ReaderOptions,
    state: ReaderState,
}

impl StreamHeaderReader {
    /// Fresh reader in the `AwaitingData` state
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            state: ReaderState::AwaitingData,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Options the reader was built with
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Read and decode the header.
    ///
    /// The source is paused for the duration of the call and resumed
    /// exactly once on return, whatever the outcome, including when the
    /// returned future is dropped. A second call fails with
    /// [`ProxyError::ReaderSpent`] without touching the source.
    pub async fn read_header<S>(&mut self, source: &mut S) -> Result<ProxiedHeader, ProxyError>
    where
        S: ByteSource + ?Sized,
    {
        if self.state == ReaderState::Done {
            return Err(ProxyError::ReaderSpent);
        }
        self.state = ReaderState::Done;

        let mut source = PauseGuard::new(source);

        let chunk = match self.options.mode {
            ReadMode::SingleChunk => source.next_chunk().await?.unwrap_or_default(),
            ReadMode::Accumulate { max_header_size } => {
                accumulate(&mut *source, self.options.allow_wrong_magic, max_header_size).await?
            }
        };
        trace!(len = chunk.len(), "PROXY header chunk received");

        self.decode(chunk)
    }

    /// [`read_header`](Self::read_header) bounded by a deadline
    pub async fn read_header_timeout<S>(
        &mut self,
        source: &mut S,
        limit: Duration,
    ) -> Result<ProxiedHeader, ProxyError>
    where
        S: ByteSource + ?Sized,
    {
        match timeout(limit, self.read_header(source)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?limit, "timed out waiting for PROXY header");
                Err(ProxyError::Timeout)
            }
        }
    }

    fn decode(&self, chunk: Bytes) -> Result<ProxiedHeader, ProxyError> {
        let header = match parse_header(&chunk, self.options.allow_wrong_magic) {
            DecodeOutcome::TooShort => {
                debug!(len = chunk.len(), "PROXY header too short");
                return Err(ProxyError::TooShort { chunk });
            }
            DecodeOutcome::WrongMagic => {
                debug!(len = chunk.len(), "no PROXY v2 signature");
                return Err(ProxyError::WrongMagic { chunk });
            }
            DecodeOutcome::Decoded(header) => header,
        };

        if self.options.strict && !header.is_supported() {
            warn!(?header, "rejecting unsupported PROXY header");
            return Err(ProxyError::Unsupported { header, chunk });
        }

        let end = header.total_len();
        if chunk.len() < end {
            debug!(
                len = chunk.len(),
                needed = end,
                "PROXY address body incomplete"
            );
            return Err(ProxyError::TooShort { chunk });
        }

        let body = chunk.slice(FIXED_HEADER_LEN..end);
        let address = match decode_address(&header, &body) {
            Ok(address) => address,
            Err(e) if e.is_contract_violation() => {
                error!(error = %e, "PROXY body split is inconsistent");
                return Err(ProxyError::ContractViolation(e));
            }
            Err(e) => {
                warn!(error = %e, "invalid PROXY address body");
                return Err(ProxyError::InvalidAddress { source: e, chunk });
            }
        };

        let remainder = chunk.slice(end..);
        debug!(
            command = ?header.command,
            family = %header.family,
            body_length = header.body_length,
            remainder = remainder.len(),
            "PROXY header decoded"
        );

        Ok(ProxiedHeader {
            header,
            address,
            remainder,
        })
    }
}

/// Buffer chunks until the fixed header and its declared body are present
async fn accumulate<S>(
    source: &mut S,
    allow_wrong_magic: bool,
    limit: usize,
) -> Result<Bytes, ProxyError>
where
    S: ByteSource + ?Sized,
{
    let mut buf = BytesMut::new();

    loop {
        // A mismatching prefix will never become a header, don't wait for 16 bytes
        if !allow_wrong_magic && !signature_prefix_matches(&buf) {
            debug!(len = buf.len(), "no PROXY v2 signature");
            return Err(ProxyError::WrongMagic { chunk: buf.freeze() });
        }

        let needed = match parse_header(&buf, allow_wrong_magic) {
            DecodeOutcome::TooShort => FIXED_HEADER_LEN,
            DecodeOutcome::WrongMagic => {
                return Err(ProxyError::WrongMagic { chunk: buf.freeze() });
            }
            DecodeOutcome::Decoded(header) => header.total_len(),
        };

        if needed > limit {
            warn!(needed, limit, "PROXY header exceeds size limit");
            return Err(ProxyError::HeaderTooLarge {
                needed,
                limit,
                chunk: buf.freeze(),
            });
        }
        if buf.len() >= needed {
            return Ok(buf.freeze());
        }

        match source.next_chunk().await? {
            Some(chunk) => {
                trace!(len = chunk.len(), buffered = buf.len(), "accumulating PROXY header");
                buf.extend_from_slice(&chunk);
            }
            None => return Ok(buf.freeze()),
        }
    }
}

/// Pauses a source on creation and resumes it on drop
struct PauseGuard<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: ByteSource + ?Sized> PauseGuard<'a, S> {
    fn new(source: &'a mut S) -> Self {
        source.pause();
        Self { source }
    }
}

impl<S: ByteSource + ?Sized> Deref for PauseGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.source
    }
}

impl<S: ByteSource + ?Sized> DerefMut for PauseGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.source
    }
}

impl<S: ByteSource + ?Sized> Drop for PauseGuard<'_, S> {
    fn drop(&mut self) {
        self.source.resume();
    }
}
