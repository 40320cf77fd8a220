//! ContentHash - Dedup key derived from normalized text
//!
//! Two texts that differ only in casing or whitespace density hash
//! identically: the dedup unit is "the same words", not "the same bytes".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::errors::DomainError;

/// Length of a hex-rendered SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// 64-char lowercase hex SHA-256 of normalized content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash text after normalization.
    ///
    /// Fails with `EmptyInput` when the text is empty before or after
    /// normalization.
    pub fn compute(text: &str) -> Result<Self, DomainError> {
        if text.is_empty() {
            return Err(DomainError::EmptyInput(
                "text must be a non-empty string".to_string(),
            ));
        }

        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Err(DomainError::EmptyInput(
                "text is empty after normalization".to_string(),
            ));
        }

        let digest = Sha256::digest(normalized.as_bytes());
        Ok(Self(hex::encode(digest)))
    }

    /// Accept an already-rendered hash from an untrusted source
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        if !is_valid_hash(s) {
            return Err(DomainError::Validation(format!(
                "invalid content hash: {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trim, lowercase, and collapse every whitespace run into one space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `s` has the shape of a rendered hash (64 hex chars)
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = ContentHash::compute("Hello  World").unwrap();
        let b = ContentHash::compute("hello world").unwrap();
        let c = ContentHash::compute("hello\nworld").unwrap();
        let d = ContentHash::compute("\t HELLO\t\tworld \n").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
    }

    #[test]
    fn test_different_words_differ() {
        let a = ContentHash::compute("pay $50 to acme corp").unwrap();
        let b = ContentHash::compute("pay $60 to acme corp").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            ContentHash::compute(""),
            Err(DomainError::EmptyInput(_))
        ));
        assert!(matches!(
            ContentHash::compute(" \n\t "),
            Err(DomainError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_known_digest() {
        // sha256("hello world")
        let hash = ContentHash::compute("Hello World").unwrap();
        assert_eq!(
            hash.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(is_valid_hash(hash.as_str()));
    }

    #[test]
    fn test_is_valid_hash() {
        assert!(is_valid_hash(&"a".repeat(64)));
        assert!(is_valid_hash(&format!("{}abcd", "ABCDEF0123".repeat(6))));
        assert!(!is_valid_hash(&"a".repeat(63)));
        assert!(!is_valid_hash(&"g".repeat(64)));
        assert!(!is_valid_hash(""));
    }

    #[test]
    fn test_parse_lowercases() {
        let upper = "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9";
        let parsed = ContentHash::parse(upper).unwrap();
        assert_eq!(parsed, ContentHash::compute("hello world").unwrap());
        assert!(ContentHash::parse("not-a-hash").is_err());
    }
}
