//! Secret access codes granting read access to a page.
//!
//! A code is [`ACCESS_CODE_LEN`] characters drawn from a 32-character
//! alphabet that leaves out glyphs people confuse when reading a code aloud
//! or copying it from a card (`I`, `O`, `0`, `1`). Comparison is
//! case-sensitive: `ab3defgh9k` is not the same code as `AB3DEFGH9K`.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::KeepsakeError;

/// Number of characters in every access code.
pub const ACCESS_CODE_LEN: usize = 10;

/// The 32 characters an access code may contain.
pub const ACCESS_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A well-formed access code.
///
/// Construction goes through [`AccessCode::parse`] or
/// [`AccessCode::generate`], so every value held in this type has the right
/// length and alphabet. Whether a page actually carries the code is a
/// question for the code resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Draws a fresh code from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ACCESS_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..ACCESS_CODE_ALPHABET.len());
                ACCESS_CODE_ALPHABET.get(idx).copied().map_or('A', char::from)
            })
            .collect();
        Self(code)
    }

    /// Draws a fresh code from the thread-local RNG.
    #[must_use]
    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    /// Validates `candidate` as an access code without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::InvalidAccessCode`] if the candidate has the
    /// wrong length or contains a character outside the alphabet.
    pub fn parse(candidate: &str) -> Result<Self, KeepsakeError> {
        if candidate.len() != ACCESS_CODE_LEN {
            return Err(KeepsakeError::InvalidAccessCode(format!(
                "expected {ACCESS_CODE_LEN} characters"
            )));
        }
        if !candidate.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)) {
            return Err(KeepsakeError::InvalidAccessCode(
                "contains characters outside the code alphabet".to_string(),
            ));
        }
        Ok(Self(candidate.to_string()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccessCode {
    type Err = KeepsakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = KeepsakeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn alphabet_has_no_ambiguous_glyphs() {
        for ambiguous in [b'I', b'O', b'0', b'1'] {
            assert!(!ACCESS_CODE_ALPHABET.contains(&ambiguous));
        }
        let mut sorted = ACCESS_CODE_ALPHABET.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 32);
    }

    #[test]
    fn generated_codes_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = AccessCode::generate(&mut rng);
            assert!(AccessCode::parse(code.as_str()).is_ok(), "bad code {code}");
        }
    }

    #[test]
    fn random_codes_differ() {
        assert_ne!(AccessCode::random(), AccessCode::random());
    }

    #[test]
    fn parse_accepts_known_code() {
        let Ok(code) = AccessCode::parse("AB3DEFGH9K") else {
            panic!("valid code rejected");
        };
        assert_eq!(code.to_string(), "AB3DEFGH9K");
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!(AccessCode::parse("ab3defgh9k").is_err());
    }

    #[test]
    fn parse_rejects_wrong_length_and_ambiguous_chars() {
        assert!(AccessCode::parse("AB3DEFGH9").is_err());
        assert!(AccessCode::parse("AB3DEFGH9KK").is_err());
        assert!(AccessCode::parse("AB3DEFGH0K").is_err());
        assert!(AccessCode::parse("").is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<AccessCode, _> = serde_json::from_str("\"AB3DEFGH9K\"");
        assert!(ok.is_ok());
        let bad: Result<AccessCode, _> = serde_json::from_str("\"AB3DEFGHIK\"");
        assert!(bad.is_err());
    }
}
