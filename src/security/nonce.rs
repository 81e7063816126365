//! Per-response CSP nonces.

use std::fmt;

use uuid::Uuid;

/// Error returned for externally supplied nonce tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    #[error("nonce must not be empty")]
    Empty,
    #[error("nonce contains a character outside the base64/hex alphabet: {0:?}")]
    InvalidCharacter(char),
}

/// An unguessable, single-use token allowing specific inline elements under CSP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh nonce: a v4 UUID with separators stripped.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept a caller-supplied token.
    pub fn parse(token: &str) -> Result<Self, NonceError> {
        if token.is_empty() {
            return Err(NonceError::Empty);
        }
        if let Some(bad) = token
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_')))
        {
            return Err(NonceError::InvalidCharacter(bad));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `'nonce-…'` source expression.
    pub fn source_expression(&self) -> String {
        format!("'nonce-{}'", self.0)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
