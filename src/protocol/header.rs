//! Handshake header codec.
//!
//! # Wire Layout
//! ```text
//! offset 0          : version (opaque)
//! offset 1..17      : auth token
//! offset 17..22     : reserved
//! offset 22         : address length L
//! offset 23..23+L   : host (UTF-8)
//! offset 23+L..25+L : port (big-endian u16)
//! offset 25+L..     : payload
//! ```

use thiserror::Error;

use crate::protocol::auth::{AuthToken, TOKEN_LEN};

/// Buffers shorter than this are rejected before any field is read.
pub const MIN_HEADER_LEN: usize = 24;

const VERSION_OFFSET: usize = 0;
const TOKEN_OFFSET: usize = 1;
const RESERVED_LEN: usize = 5;
const ADDRESS_LEN_OFFSET: usize = 22;
const ADDRESS_OFFSET: usize = 23;

/// Errors produced while decoding a handshake.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The buffer ends before the header does.
    #[error("handshake truncated: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },

    /// Token bytes do not match the configured user id.
    #[error("invalid user")]
    UnauthorizedToken,

    /// Address is empty or not UTF-8.
    #[error("invalid destination address")]
    InvalidAddress,

    /// Host does not fit the one-byte length field (encoder only).
    #[error("address of {0} bytes exceeds 255")]
    AddressTooLong(usize),
}

impl HeaderError {
    /// Truncated or undecodable input, as opposed to a bad token.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, HeaderError::UnauthorizedToken)
    }
}

/// A validated handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub version: u8,
    pub host: String,
    pub port: u16,
    /// Index in the source buffer where client payload begins.
    pub payload_offset: usize,
}

impl HandshakeHeader {
    /// The two-byte reply sent ahead of the first downstream chunk.
    pub fn response_prefix(&self) -> [u8; 2] {
        [self.version, 0]
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn destination(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Decode the handshake at the start of `buf`.
///
/// Never reads past `buf.len()`; any out-of-bounds field is `TooShort`.
pub fn parse_header(buf: &[u8], expected: &AuthToken) -> Result<HandshakeHeader, HeaderError> {
    let field = move |start: usize, end: usize| {
        buf.get(start..end).ok_or(HeaderError::TooShort {
            needed: end,
            actual: buf.len(),
        })
    };

    if buf.len() < MIN_HEADER_LEN {
        return Err(HeaderError::TooShort {
            needed: MIN_HEADER_LEN,
            actual: buf.len(),
        });
    }

    let version = buf[VERSION_OFFSET];
    if !expected.matches(field(TOKEN_OFFSET, TOKEN_OFFSET + TOKEN_LEN)?) {
        return Err(HeaderError::UnauthorizedToken);
    }

    let address_len = buf[ADDRESS_LEN_OFFSET] as usize;
    let address_end = ADDRESS_OFFSET + address_len;
    let address = field(ADDRESS_OFFSET, address_end)?;
    let port_bytes = field(address_end, address_end + 2)?;

    let host = std::str::from_utf8(address).map_err(|_| HeaderError::InvalidAddress)?;
    if host.is_empty() {
        return Err(HeaderError::InvalidAddress);
    }

    Ok(HandshakeHeader {
        version,
        host: host.to_string(),
        port: u16::from_be_bytes([port_bytes[0], port_bytes[1]]),
        payload_offset: address_end + 2,
    })
}

/// Build a handshake for `host:port`. Reserved bytes are zero.
pub fn encode_header(
    version: u8,
    token: &AuthToken,
    host: &str,
    port: u16,
) -> Result<Vec<u8>, HeaderError> {
    let address_len =
        u8::try_from(host.len()).map_err(|_| HeaderError::AddressTooLong(host.len()))?;
    if host.is_empty() {
        return Err(HeaderError::InvalidAddress);
    }

    let mut out = Vec::with_capacity(ADDRESS_OFFSET + host.len() + 2);
    out.push(version);
    out.extend_from_slice(token.as_bytes());
    out.extend_from_slice(&[0u8; RESERVED_LEN]);
    out.push(address_len);
    out.extend_from_slice(host.as_bytes());
    out.extend_from_slice(&port.to_be_bytes());
    Ok(out)
}
