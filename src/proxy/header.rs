//! PROXY v2 Fixed Header
//!
//! Decodes the 16-byte fixed prefix of a PROXY protocol v2 header
//! (signature, version/command, family, body length). Pure, no I/O.

use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::SocketAddrV4;

/// PROXY v2 signature (12 bytes)
pub const PROXY_V2_SIGNATURE: [u8; 12] = *b"\r\n\r\n\x00\r\nQUIT\n";

/// Offset of the version/command byte
pub const CMD_VER_OFFSET: usize = PROXY_V2_SIGNATURE.len();

/// Offset of the address family byte
pub const FAMILY_OFFSET: usize = CMD_VER_OFFSET + 1;

/// Offset of the big-endian body length
pub const LENGTH_OFFSET: usize = FAMILY_OFFSET + 1;

/// Size of the fixed header, signature through body length
pub const FIXED_HEADER_LEN: usize = LENGTH_OFFSET + 2;

const HIGH_NIBBLE: u8 = 0xF0;
const LOW_NIBBLE: u8 = 0x0F;

/// Command carried in the low nibble of byte 12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Connection was established by the proxy itself (health checks)
    Local,
    /// Connection is relayed on behalf of a client
    Proxy,
    /// Any other nibble value, preserved as received
    Invalid(u8),
}

impl Command {
    /// Map the low nibble of the version/command byte
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & LOW_NIBBLE {
            0x0 => Command::Local,
            0x1 => Command::Proxy,
            other => Command::Invalid(other),
        }
    }

    /// Wire nibble, the inverse of `from_nibble`
    pub fn to_nibble(self) -> u8 {
        match self {
            Command::Local => 0x0,
            Command::Proxy => 0x1,
            Command::Invalid(n) => n & LOW_NIBBLE,
        }
    }

    /// LOCAL or PROXY
    pub fn is_valid(self) -> bool {
        !matches!(self, Command::Invalid(_))
    }
}

/// Protocol version carried in the high nibble of byte 12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Protocol version 2, the only one with a binary header
    V2,
    /// Any other high nibble, preserved shifted down (0x0..=0xF)
    Unsupported(u8),
}

impl Version {
    /// Map the high nibble, already shifted down
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & LOW_NIBBLE {
            0x2 => Version::V2,
            other => Version::Unsupported(other),
        }
    }

    /// Wire nibble, unshifted
    pub fn to_nibble(self) -> u8 {
        match self {
            Version::V2 => 0x2,
            Version::Unsupported(n) => n & LOW_NIBBLE,
        }
    }

    /// True for version 2 only
    pub fn is_supported(self) -> bool {
        self == Version::V2
    }
}

/// Address family and transport protocol (byte 13)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// 0x00, no address (LOCAL connections)
    Unspec,
    /// 0x11, the only family whose body is decoded
    TcpV4,
    /// 0x12
    UdpV4,
    /// 0x21
    TcpV6,
    /// 0x22
    UdpV6,
    /// 0x31
    UnixStream,
    /// 0x32
    UnixDgram,
    /// Unassigned byte value, preserved as received
    Unknown(u8),
}

impl Family {
    /// Map byte 13, keeping unassigned values
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Family::Unspec,
            0x11 => Family::TcpV4,
            0x12 => Family::UdpV4,
            0x21 => Family::TcpV6,
            0x22 => Family::UdpV6,
            0x31 => Family::UnixStream,
            0x32 => Family::UnixDgram,
            other => Family::Unknown(other),
        }
    }

    /// Wire byte, the inverse of `from_byte`
    pub const fn to_byte(self) -> u8 {
        match self {
            Family::Unspec => 0x00,
            Family::TcpV4 => 0x11,
            Family::UdpV4 => 0x12,
            Family::TcpV6 => 0x21,
            Family::UdpV6 => 0x22,
            Family::UnixStream => 0x31,
            Family::UnixDgram => 0x32,
            Family::Unknown(b) => b,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Unspec => write!(f, "UNSPEC"),
            Family::TcpV4 => write!(f, "TCP4"),
            Family::UdpV4 => write!(f, "UDP4"),
            Family::TcpV6 => write!(f, "TCP6"),
            Family::UdpV6 => write!(f, "UDP6"),
            Family::UnixStream => write!(f, "UNIX_STREAM"),
            Family::UnixDgram => write!(f, "UNIX_DGRAM"),
            Family::Unknown(b) => write!(f, "UNKNOWN({:#04x})", b),
        }
    }
}

/// Decoded fixed part of a PROXY v2 header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// LOCAL or PROXY, from the low nibble of byte 12
    pub command: Command,
    /// From the high nibble of byte 12
    pub version: Version,
    /// Byte 13
    pub family: Family,
    /// Exact byte count of the address body that follows the fixed header.
    /// Authoritative for every family, known or not.
    pub body_length: u16,
}

impl Header {
    /// Version 2 header with the given fields
    pub fn new(command: Command, family: Family, body_length: u16) -> Self {
        Self {
            command,
            version: Version::V2,
            family,
            body_length,
        }
    }

    /// Both the version and the command nibble hold assigned values
    pub fn is_supported(&self) -> bool {
        self.version.is_supported() && self.command.is_valid()
    }

    /// Fixed header plus declared body
    pub fn total_len(&self) -> usize {
        FIXED_HEADER_LEN + self.body_length as usize
    }

    /// Write the 16-byte fixed header (always with the correct signature)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(FIXED_HEADER_LEN);
        buf.put_slice(&PROXY_V2_SIGNATURE);
        buf.put_u8((self.version.to_nibble() << 4) | self.command.to_nibble());
        buf.put_u8(self.family.to_byte());
        buf.put_u16(self.body_length);
    }
}

/// Build a complete PROXY/TCP4 header: fixed part plus 12-byte body
pub fn encode_tcp_v4(remote: SocketAddrV4, local: SocketAddrV4) -> BytesMut {
    let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + 12);
    Header::new(Command::Proxy, Family::TcpV4, 12).encode(&mut buf);
    buf.put_slice(&remote.ip().octets());
    buf.put_slice(&local.ip().octets());
    buf.put_u16(remote.port());
    buf.put_u16(local.port());
    buf
}

/// Result of inspecting a buffer for a fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Fewer than 16 bytes available
    TooShort,
    /// 16 bytes available but the signature does not match
    WrongMagic,
    /// Fixed header decoded, body not inspected
    Decoded(Header),
}

/// True while the bytes seen so far could still be the start of a PROXY v2
/// signature. Only the first 12 bytes are compared.
pub fn signature_prefix_matches(buf: &[u8]) -> bool {
    let n = buf.len().min(PROXY_V2_SIGNATURE.len());
    buf[..n] == PROXY_V2_SIGNATURE[..n]
}

/// Parse the fixed header at the start of `buf`.
///
/// Bytes past the first 16 are ignored. With `allow_wrong_magic` the
/// signature check is skipped entirely.
pub fn parse_header(buf: &[u8], allow_wrong_magic: bool) -> DecodeOutcome {
    if buf.len() < FIXED_HEADER_LEN {
        return DecodeOutcome::TooShort;
    }

    if !allow_wrong_magic && buf[..CMD_VER_OFFSET] != PROXY_V2_SIGNATURE {
        return DecodeOutcome::WrongMagic;
    }

    let cmd_ver = buf[CMD_VER_OFFSET];
    let header = Header {
        command: Command::from_nibble(cmd_ver & LOW_NIBBLE),
        version: Version::from_nibble((cmd_ver & HIGH_NIBBLE) >> 4),
        family: Family::from_byte(buf[FAMILY_OFFSET]),
        body_length: u16::from_be_bytes([buf[LENGTH_OFFSET], buf[LENGTH_OFFSET + 1]]),
    };

    DecodeOutcome::Decoded(header)
}
