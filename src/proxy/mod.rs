//! PROXY Protocol Module
//!
//! Decodes HAProxy PROXY protocol v2 headers. The fixed header and the
//! address body are parsed by pure functions; [`StreamHeaderReader`] pulls
//! exactly one header off a live byte source and returns the bytes that
//! followed it.

mod address;
mod error;
mod header;
mod reader;
mod source;
mod stream;

pub use address::{decode_address, AddressError, AddressInfo, TCP_V4_BODY_LEN};
pub use error::ProxyError;
pub use header::{
    encode_tcp_v4, parse_header, signature_prefix_matches, Command, DecodeOutcome, Family, Header,
    Version, FIXED_HEADER_LEN, PROXY_V2_SIGNATURE,
};
pub use reader::{
    ProxiedHeader, ReadMode, ReaderOptions, ReaderState, StreamHeaderReader, MAX_HEADER_SIZE,
};
pub use source::{ByteSource, StreamSource, DEFAULT_CHUNK_SIZE};
pub use stream::ProxiedStream;
