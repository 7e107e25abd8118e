//! Deterministic key and change-detection digests.
//!
//! Values are null-coalesced to `""`, encoded into one string with an
//! unambiguous [`KeyEncoding`], and hashed with SHA-256 into lowercase hex.
//! [`HashProvider::digest_expr`] builds the SQL expression computing the very
//! same digest inside the warehouse, so in-process and generated digests
//! agree byte for byte.

use crate::error::CompileError;
use crate::sql::{Expr, Ident};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// ASCII unit separator: a control character that does not occur in
/// ordinary business data.
pub const DEFAULT_KEY_SEPARATOR: &str = "\u{1f}";

/// Length of a hex SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// How an ordered tuple of values becomes a single digest input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum KeyEncoding {
    /// Values joined with `separator`; a value containing it is rejected.
    Delimited { separator: String },
    /// Each value written as `<char count>:<value>`.
    LengthPrefixed,
}

impl Default for KeyEncoding {
    fn default() -> Self {
        KeyEncoding::Delimited {
            separator: DEFAULT_KEY_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HashProvider {
    encoding: KeyEncoding,
}

impl HashProvider {
    pub fn new(encoding: KeyEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> &KeyEncoding {
        &self.encoding
    }

    /// Encodes `values` into the digest input string.
    pub fn encode(&self, values: &[Option<&str>]) -> Result<String, CompileError> {
        match &self.encoding {
            KeyEncoding::Delimited { separator } => {
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    let value = value.unwrap_or("");
                    if !separator.is_empty() && value.contains(separator.as_str()) {
                        return Err(CompileError::AmbiguousKeyDelimiter {
                            separator: separator.clone(),
                            value: value.to_string(),
                        });
                    }
                    parts.push(value);
                }
                Ok(parts.join(separator))
            }
            KeyEncoding::LengthPrefixed => {
                let mut encoded = String::new();
                for value in values {
                    let value = value.unwrap_or("");
                    encoded.push_str(&value.chars().count().to_string());
                    encoded.push(':');
                    encoded.push_str(value);
                }
                Ok(encoded)
            }
        }
    }

    /// Lowercase hex SHA-256 of the encoded values.
    pub fn digest(&self, values: &[Option<&str>]) -> Result<String, CompileError> {
        let encoded = self.encode(values)?;
        Ok(hex_sha256(encoded.as_bytes()))
    }

    /// SQL expression computing [`digest`](Self::digest) over `fields`, in
    /// the given order, optionally qualified by a relation alias.
    pub fn digest_expr<'a, I>(&self, fields: I, qualifier: Option<&Ident>) -> Expr
    where
        I: IntoIterator<Item = &'a Ident>,
    {
        let values = fields
            .into_iter()
            .map(|field| Expr::qualified(qualifier, field).text_or_empty());

        let parts = match &self.encoding {
            KeyEncoding::Delimited { separator } => {
                let mut parts = Vec::new();
                for (i, value) in values.enumerate() {
                    if i > 0 {
                        parts.push(Expr::string(separator.as_str()));
                    }
                    parts.push(value);
                }
                parts
            }
            KeyEncoding::LengthPrefixed => values
                .flat_map(|value| {
                    [
                        value.clone().char_length().cast_text(),
                        Expr::string(":"),
                        value,
                    ]
                })
                .collect(),
        };

        Expr::concat(parts).hex_digest()
    }
}

pub(crate) fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
