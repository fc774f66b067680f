//! Content digest values returned by the registry
//!
//! A digest is `<algorithm>:<hex>`. Only the prefix and hex length are
//! checked; the value is otherwise opaque.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported algorithms and their hex lengths
const ALGORITHMS: &[(&str, usize)] = &[("sha256", 64), ("sha384", 96), ("sha512", 128)];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Validate and wrap a digest string such as `sha256:e3b0...`
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (algorithm, encoded) = value.split_once(':').ok_or_else(|| {
            RegistryError::Parse(format!("Digest is missing an algorithm prefix: {}", value))
        })?;

        let expected_len = ALGORITHMS
            .iter()
            .find(|(name, _)| *name == algorithm)
            .map(|(_, len)| *len)
            .ok_or_else(|| {
                RegistryError::Parse(format!("Unsupported digest algorithm: {}", algorithm))
            })?;

        if encoded.len() != expected_len {
            return Err(RegistryError::Parse(format!(
                "Invalid {} digest length: expected {} hex characters, got {}",
                algorithm,
                expected_len,
                encoded.len()
            )));
        }

        if !encoded.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(RegistryError::Parse(format!(
                "Invalid {} digest: contains non-hex characters",
                algorithm
            )));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map(|(alg, _)| alg).unwrap_or_default()
    }

    /// Hex part without the algorithm prefix
    pub fn encoded(&self) -> &str {
        self.0.split_once(':').map(|(_, hex)| hex).unwrap_or_default()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
