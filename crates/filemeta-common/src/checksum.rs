//! Content checksums for filemeta
//!
//! Uploaded content is hashed with SHA-256 while it is copied into place.
//! File records carry the digest hex-encoded.

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of file content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Digest a complete buffer
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Parse a hex-encoded digest as stored on file records
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        bytes.try_into().ok().map(Self)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compare against a hex-encoded digest (case-insensitive)
    #[must_use]
    pub fn matches_hex(&self, expected: &str) -> bool {
        Self::from_hex(expected).is_some_and(|other| other == *self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Streaming SHA-256 over content written in chunks
#[derive(Clone, Default)]
pub struct ChecksumCalculator {
    hasher: Sha256,
    bytes: u64,
}

impl ChecksumCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes seen so far
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    #[must_use]
    pub fn finalize(self) -> Checksum {
        Checksum(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_known_digest() {
        let checksum = Checksum::compute(b"");
        assert_eq!(checksum.to_hex(), EMPTY_SHA256);
        assert_eq!(checksum.to_string(), EMPTY_SHA256);
    }

    #[test]
    fn test_matches_hex() {
        let checksum = Checksum::compute(b"");
        assert!(checksum.matches_hex(&EMPTY_SHA256.to_ascii_uppercase()));
        assert!(!checksum.matches_hex("00"));
        assert!(!checksum.matches_hex("not hex"));
        assert!(!Checksum::compute(b"x").matches_hex(EMPTY_SHA256));
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(Checksum::from_hex(EMPTY_SHA256).is_some());
        assert!(Checksum::from_hex(&EMPTY_SHA256[..62]).is_none());
    }

    #[test]
    fn test_streaming_calculator() {
        let data = b"hello, world!";
        let expected = Checksum::compute(data);

        let mut calc = ChecksumCalculator::new();
        calc.update(b"hello, ");
        calc.update(b"world!");
        assert_eq!(calc.bytes(), data.len() as u64);
        assert_eq!(calc.finalize(), expected);
    }
}
