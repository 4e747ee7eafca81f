//! Per-process client identity
//!
//! The identity is created once at startup and embedded in envelopes, the
//! streaming URL and the namespace join packet. It never changes afterwards

use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Number of random bytes behind a generated identity (8 hex characters)
const GENERATED_ID_BYTES: usize = 4;

/// Opaque, immutable client identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(Arc<str>);

impl ClientIdentity {
    /// Generate a random hex identity
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; GENERATED_ID_BYTES] = rand::random();
        Self(hex::encode(bytes).into())
    }

    /// Use a fixed device identifier
    ///
    /// # Errors
    ///
    /// Returns error if the identifier is empty or contains characters that
    /// cannot appear in a URL path segment
    pub fn fixed(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Config("client identity cannot be empty".to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(Error::Config(format!("invalid client identity: {id}")));
        }
        Ok(Self(id.into()))
    }

    /// The identifier as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
