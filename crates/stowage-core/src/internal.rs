//! Internal configuration document.
//!
//! `INTERNAL` placeholders read from a nested JSON document owned by the
//! caller. The typed [`Internal`] record mirrors the persisted shape
//! (`SUBKEY.PRIVATE`, `HOST.DOMAIN`, ...) and converts into that document with
//! [`Internal::to_document`]; any other `serde_json::Value` works as well.
//!
//! Stored key material is hex text. Re-encoding transforms decode the hex and
//! emit base64 or base58 (Bitcoin alphabet).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResolveError;
use crate::point::{InternalTransform, path_segments};

/// Internal options saved by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internal {
    #[serde(rename = "SUBKEY", default)]
    pub subkey: Subkey,
    #[serde(rename = "HOST", default)]
    pub host: Host,
}

/// Subkey material, hex encoded.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subkey {
    #[serde(rename = "PRIVATE", default)]
    pub private: String,
    #[serde(rename = "PUBLIC", default)]
    pub public: String,
    #[serde(rename = "SIGNATURE", default)]
    pub signature: String,
}

impl std::fmt::Debug for Subkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subkey")
            .field("private", &"[REDACTED]")
            .field("public", &self.public)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Host the services are published under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "DOMAIN", default)]
    pub domain: String,
}

impl Internal {
    /// Convert into the JSON document traversed by `INTERNAL` placeholders.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Follow `path` through `document` and return the string it ends on.
///
/// # Errors
///
/// Returns [`ResolveError::PathNotFound`] when a segment is missing or its
/// parent is not an object, and [`ResolveError::NotAString`] when the final
/// value is not a string.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Result<&'a str, ResolveError> {
    let mut node = document;
    for segment in path_segments(path) {
        node = node.get(segment).ok_or_else(|| ResolveError::PathNotFound {
            path: path.to_owned(),
            segment: segment.to_owned(),
        })?;
    }
    node.as_str().ok_or_else(|| ResolveError::NotAString {
        path: path.to_owned(),
    })
}

/// Re-encode a stored hex value.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidTransformInput`] if a base64/base58
/// transform is requested and `value` is not valid hex.
pub fn transform(
    path: &str,
    value: &str,
    transform: InternalTransform,
) -> Result<String, ResolveError> {
    let decode = || {
        hex::decode(value).map_err(|e| ResolveError::InvalidTransformInput {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    };

    match transform {
        InternalTransform::None | InternalTransform::Hex => Ok(value.to_owned()),
        InternalTransform::Base64 => Ok(STANDARD.encode(decode()?)),
        InternalTransform::Base58 => Ok(bs58::encode(decode()?).into_string()),
    }
}

/// Look up `path` and apply `transform` to it.
///
/// # Errors
///
/// Propagates the errors of [`lookup`] and [`transform`].
pub fn resolve(
    document: &Value,
    path: &str,
    transform_kind: InternalTransform,
) -> Result<String, ResolveError> {
    let raw = lookup(document, path)?;
    transform(path, raw, transform_kind)
}
