//! Client identity token.
//!
//! The token travels as 16 raw bytes in the handshake and is configured as the
//! canonical hyphenated text form of a version-4 UUID.

use thiserror::Error;
use uuid::{Uuid, Variant};

/// Length of the token on the wire.
pub const TOKEN_LEN: usize = 16;

/// Length of the canonical hyphenated text form.
const CANONICAL_LEN: usize = 36;

/// Errors produced when parsing a configured user id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not in `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    #[error("user id must be a hyphenated UUID, got {0:?}")]
    NotCanonical(String),

    /// Hyphenated but not a valid UUID.
    #[error("user id is not a valid UUID: {0}")]
    Invalid(String),

    /// A valid UUID that is not an RFC 4122 version 4 identifier.
    #[error("user id must be an RFC 4122 version 4 UUID")]
    WrongVersion,
}

/// The 16-byte identifier a client must present in its handshake.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthToken([u8; TOKEN_LEN]);

impl AuthToken {
    /// Parse the canonical text form (case-insensitive).
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let hyphens_ok = text.len() == CANONICAL_LEN
            && text
                .char_indices()
                .all(|(i, c)| matches!(i, 8 | 13 | 18 | 23) == (c == '-'));
        if !hyphens_ok {
            return Err(TokenError::NotCanonical(text.to_string()));
        }

        let uuid = Uuid::try_parse(text).map_err(|e| TokenError::Invalid(e.to_string()))?;
        if uuid.get_version_num() != 4 || uuid.get_variant() != Variant::RFC4122 {
            return Err(TokenError::WrongVersion);
        }

        Ok(Self(*uuid.as_bytes()))
    }

    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    /// Exact comparison against a token slice taken from the wire.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate == self.0.as_slice()
    }
}

impl std::fmt::Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

// Tokens identify users; keep them out of debug logs.
impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

impl std::str::FromStr for AuthToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ID: &str = "d342d11e-d424-4583-b36e-524ab1f0afa4";

    #[test]
    fn parses_canonical_v4() {
        let token = AuthToken::parse(USER_ID).unwrap();
        assert_eq!(token.as_bytes()[0], 0xd3);
        assert_eq!(token.as_bytes()[15], 0xa4);
        assert_eq!(token.to_string(), USER_ID);
    }

    #[test]
    fn accepts_uppercase() {
        let upper = USER_ID.to_uppercase();
        assert_eq!(AuthToken::parse(&upper), AuthToken::parse(USER_ID));
    }

    #[test]
    fn rejects_non_hyphenated_forms() {
        let simple = USER_ID.replace('-', "");
        assert!(matches!(AuthToken::parse(&simple), Err(TokenError::NotCanonical(_))));

        let braced = format!("{{{}}}", USER_ID);
        assert!(matches!(AuthToken::parse(&braced), Err(TokenError::NotCanonical(_))));

        assert!(matches!(AuthToken::parse(""), Err(TokenError::NotCanonical(_))));
    }

    #[test]
    fn rejects_bad_hex() {
        let bad = "g342d11e-d424-4583-b36e-524ab1f0afa4";
        assert!(matches!(AuthToken::parse(bad), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn rejects_wrong_version_and_variant() {
        // version nibble 1
        let v1 = "d342d11e-d424-1583-b36e-524ab1f0afa4";
        assert_eq!(AuthToken::parse(v1), Err(TokenError::WrongVersion));

        // variant nibble c (Microsoft)
        let variant = "d342d11e-d424-4583-c36e-524ab1f0afa4";
        assert_eq!(AuthToken::parse(variant), Err(TokenError::WrongVersion));
    }

    #[test]
    fn generated_tokens_round_trip_through_text() {
        let token = AuthToken::generate();
        assert_eq!(AuthToken::parse(&token.to_string()), Ok(token));
    }

    #[test]
    fn matches_is_exact() {
        let token = AuthToken::parse(USER_ID).unwrap();
        assert!(token.matches(token.as_bytes()));
        assert!(!token.matches(&token.as_bytes()[..15]));

        let mut other = *token.as_bytes();
        other[15] ^= 0x01;
        assert!(!token.matches(&other));
    }

    #[test]
    fn debug_hides_value() {
        let token = AuthToken::parse(USER_ID).unwrap();
        assert!(!format!("{:?}", token).contains("d342"));
    }
}
