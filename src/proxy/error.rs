//! PROXY Header Errors

use bytes::Bytes;
use thiserror::Error;

use super::address::AddressError;
use super::header::Header;

/// Errors that can occur while reading a PROXY v2 header from a stream
///
/// The recoverable variants carry the raw bytes that were read, so the
/// caller can buffer and retry, or fall back to treating the connection
/// as one without a PROXY header.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Not enough bytes for the fixed header, or for the declared body
    #[error("PROXY header too short: {} bytes available", .chunk.len())]
    TooShort { chunk: Bytes },

    /// No PROXY v2 signature
    #[error("no PROXY v2 signature")]
    WrongMagic { chunk: Bytes },

    /// Version or command nibble holds an unassigned value (strict mode only)
    #[error("unsupported PROXY header: version {:?}, command {:?}", .header.version, .header.command)]
    Unsupported { header: Header, chunk: Bytes },

    /// Address body is malformed for its family
    #[error("invalid PROXY address body: {source}")]
    InvalidAddress { source: AddressError, chunk: Bytes },

    /// Accumulated header would exceed the configured bound
    #[error("PROXY header too large: {needed} bytes exceeds limit {limit}")]
    HeaderTooLarge {
        needed: usize,
        limit: usize,
        chunk: Bytes,
    },

    /// Internal stream-splitting bug
    #[error("PROXY reader contract violation: {0}")]
    ContractViolation(AddressError),

    /// `read_header` was already called on this reader
    #[error("PROXY header reader already used")]
    ReaderSpent,

    /// Timeout waiting for PROXY header
    #[error("PROXY header timeout")]
    Timeout,

    /// IO error reading from the source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Raw bytes read from the source, for the variants that keep them
    pub fn chunk(&self) -> Option<&Bytes> {
        match self {
            ProxyError::TooShort { chunk }
            | ProxyError::WrongMagic { chunk }
            | ProxyError::Unsupported { chunk, .. }
            | ProxyError::InvalidAddress { chunk, .. }
            | ProxyError::HeaderTooLarge { chunk, .. } => Some(chunk),
            _ => None,
        }
    }

    /// Take ownership of the raw bytes, if any
    pub fn into_chunk(self) -> Option<Bytes> {
        match self {
            ProxyError::TooShort { chunk }
            | ProxyError::WrongMagic { chunk }
            | ProxyError::Unsupported { chunk, .. }
            | ProxyError::InvalidAddress { chunk, .. }
            | ProxyError::HeaderTooLarge { chunk, .. } => Some(chunk),
            _ => None,
        }
    }

    /// Wire-level rejection, as opposed to I/O or programming errors
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            ProxyError::TooShort { .. }
                | ProxyError::WrongMagic { .. }
                | ProxyError::Unsupported { .. }
                | ProxyError::InvalidAddress { .. }
                | ProxyError::HeaderTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::header::Family;

    #[test]
    fn test_chunk_kept_for_recoverable_errors() {
        let chunk = Bytes::from_static(b"GET / HTTP/1.1\r\n");
        let err = ProxyError::WrongMagic {
            chunk: chunk.clone(),
        };
        assert_eq!(err.chunk(), Some(&chunk));
        assert!(err.is_protocol_error());
        assert_eq!(err.into_chunk(), Some(chunk));
    }

    #[test]
    fn test_no_chunk_for_internal_errors() {
        let err = ProxyError::ContractViolation(AddressError::LengthMismatch {
            declared: 12,
            actual: 3,
        });
        assert!(err.chunk().is_none());
        assert!(!err.is_protocol_error());
        assert!(ProxyError::ReaderSpent.chunk().is_none());
    }

    #[test]
    fn test_header_too_large_keeps_buffered_bytes() {
        let chunk = Bytes::from_static(&[0x0D, 0x0A, 0x0D]);
        let err = ProxyError::HeaderTooLarge {
            needed: 1040,
            limit: 536,
            chunk: chunk.clone(),
        };
        assert!(err.is_protocol_error());
        assert_eq!(err.chunk(), Some(&chunk));
        assert_eq!(
            err.to_string(),
            "PROXY header too large: 1040 bytes exceeds limit 536"
        );
        assert_eq!(err.into_chunk(), Some(chunk));
    }

    #[test]
    fn test_display() {
        let err = ProxyError::TooShort {
            chunk: Bytes::from_static(&[1, 2, 3]),
        };
        assert_eq!(err.to_string(), "PROXY header too short: 3 bytes available");

        let err = ProxyError::InvalidAddress {
            source: AddressError::Truncated {
                family: Family::TcpV4,
                need: 12,
                got: 4,
            },
            chunk: Bytes::new(),
        };
        assert_eq!(
            err.to_string(),
            "invalid PROXY address body: TCP4 body needs 12 bytes, header declares 4"
        );
    }
}
