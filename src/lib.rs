//! ppv2
//!
//! PROXY protocol v2 header decoding for TCP services sitting behind a
//! load balancer.
//!
//! ```
//! use ppv2::proxy::{parse_header, DecodeOutcome, Family};
//!
//! let mut wire = ppv2::proxy::PROXY_V2_SIGNATURE.to_vec();
//! wire.extend_from_slice(&[0x21, 0x11, 0x00, 0x0C]);
//!
//! match parse_header(&wire, false) {
//!     DecodeOutcome::Decoded(header) => assert_eq!(header.family, Family::TcpV4),
//!     other => panic!("{:?}", other),
//! }
//! ```

pub mod config;
pub mod proxy;
pub mod relay;
