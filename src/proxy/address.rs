//! PROXY v2 Address Body
//!
//! Decodes the variable-length body that follows the fixed header.
//! Only TCP over IPv4 is decoded; every other family yields no address.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;

use super::header::{Family, Header};

/// Body size for TCP/UDP over IPv4: 2 addresses + 2 ports
pub const TCP_V4_BODY_LEN: usize = 12;

/// Endpoints carried by a TCP4 body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressInfo {
    /// Original client address (source)
    pub remote_address: Ipv4Addr,
    /// Original client port
    pub remote_port: u16,
    /// Address the client connected to (destination)
    pub local_address: Ipv4Addr,
    /// Port the client connected to
    pub local_port: u16,
}

impl AddressInfo {
    /// Client endpoint as a socket address
    pub fn remote(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.remote_address, self.remote_port))
    }

    /// Destination endpoint as a socket address
    pub fn local(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.local_address, self.local_port))
    }
}

/// Errors from decoding an address body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The body slice handed in is not the declared length.
    /// Raised only by broken stream-splitting code, never by wire data.
    #[error("address body is {actual} bytes but header declares {declared}")]
    LengthMismatch { declared: u16, actual: usize },

    /// Declared body is too small for the family's fixed layout
    #[error("{family} body needs {need} bytes, header declares {got}")]
    Truncated { family: Family, need: usize, got: usize },
}

impl AddressError {
    /// True when the error indicates a caller bug rather than bad input
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AddressError::LengthMismatch { .. })
    }
}

/// Decode the address body for `header`.
///
/// `body` must be exactly `header.body_length` bytes. Bytes beyond the
/// 12-byte TCP4 layout (TLVs) are ignored.
pub fn decode_address(header: &Header, body: &[u8]) -> Result<Option<AddressInfo>, AddressError> {
    if body.len() != header.body_length as usize {
        return Err(AddressError::LengthMismatch {
            declared: header.body_length,
            actual: body.len(),
        });
    }

    match header.family {
        Family::TcpV4 => {
            if body.len() < TCP_V4_BODY_LEN {
                return Err(AddressError::Truncated {
                    family: header.family,
                    need: TCP_V4_BODY_LEN,
                    got: body.len(),
                });
            }

            Ok(Some(AddressInfo {
                remote_address: Ipv4Addr::new(body[0], body[1], body[2], body[3]),
                local_address: Ipv4Addr::new(body[4], body[5], body[6], body[7]),
                remote_port: u16::from_be_bytes([body[8], body[9]]),
                local_port: u16::from_be_bytes([body[10], body[11]]),
            }))
        }
        _ => Ok(None),
    }
}
