//! Application Entity title: a 1..16 character ASCII identifier,
//! space-padded to exactly 16 bytes on the wire.

use std::fmt;

use snafu::{ensure, Snafu};

/// The fixed wire width of an AE title field.
pub const AE_FIELD_LEN: usize = 16;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AeTitleError {
    #[snafu(display("AE title must be 1..=16 ASCII characters, got {} bytes", len))]
    InvalidLength { len: usize },
    #[snafu(display("AE title must be all-blank-free ASCII"))]
    NotAscii,
}

/// A validated Application Entity title.
///
/// Equality is defined on the trimmed value: `AeTitle::new("FOO")` equals
/// `AeTitle::new("FOO ")`. The wire form is always 16 bytes, right-padded
/// with spaces (0x20).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AeTitle(String);

impl AeTitle {
    /// Validate and construct an AE title from a (possibly padded) string.
    pub fn new(s: impl AsRef<str>) -> Result<Self, AeTitleError> {
        let trimmed = s.as_ref().trim();
        ensure!(
            !trimmed.is_empty() && trimmed.len() <= AE_FIELD_LEN,
            InvalidLengthSnafu { len: trimmed.len() }
        );
        ensure!(trimmed.is_ascii(), NotAsciiSnafu);
        Ok(AeTitle(trimmed.to_string()))
    }

    /// The trimmed string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode to the fixed 16-byte, space-padded wire representation.
    pub fn to_wire_bytes(&self) -> [u8; AE_FIELD_LEN] {
        let mut buf = [b' '; AE_FIELD_LEN];
        buf[..self.0.len()].copy_from_slice(self.0.as_bytes());
        buf
    }

    /// Decode from a fixed 16-byte wire field, trimming trailing spaces.
    /// Rejects a field that is entirely spaces.
    pub fn from_wire_bytes(bytes: &[u8; AE_FIELD_LEN]) -> Result<Self, AeTitleError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| AeTitleError::NotAscii)?
            .trim_end();
        Self::new(s)
    }
}

impl fmt::Display for AeTitle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_round_trips() {
        let ae = AeTitle::new("MY_SCU").unwrap();
        let wire = ae.to_wire_bytes();
        assert_eq!(wire.len(), 16);
        let back = AeTitle::from_wire_bytes(&wire).unwrap();
        assert_eq!(ae, back);
    }

    #[test]
    fn rejects_empty_and_too_long() {
        assert!(AeTitle::new("").is_err());
        assert!(AeTitle::new("                ").is_err());
        assert!(AeTitle::new("THIS_IS_WAY_TOO_LONG_FOR_AN_AE").is_err());
    }

    #[test]
    fn equality_ignores_padding() {
        assert_eq!(AeTitle::new("PACS").unwrap(), AeTitle::new("PACS ").unwrap());
    }
}
