//! Injection point model and parser.
//!
//! An injection point is the typed form of a `{{…}}` placeholder found in a
//! compose template. There are exactly three kinds:
//!
//! ```text
//! {{GENERATE:AN:64:DB_PASSWORD}}     random token, 64 alphanumeric chars
//! {{PROMPT:DB_USER}}                 value supplied by the operator
//! {{INTERNAL:SUBKEY_PRIVATE:BASE64}} field of the internal configuration
//! ```
//!
//! Fields are colon-separated and trimmed. Parsing is a pure function of the
//! placeholder interior (the text between the markers).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InjectionPointError;
use crate::generator::MAX_TOKEN_LENGTH;

/// Alphabet/encoding of a generated token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GenerateCategory {
    /// `A-Z a-z 0-9`, wire tag `AN`.
    AlphaNumeric,
    /// Standard base64 alphabet, wire tag `BASE64`.
    Base64,
    /// Lower-case hex, wire tag `HEX`.
    Hex,
}

impl GenerateCategory {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "AN" => Some(Self::AlphaNumeric),
            "BASE64" => Some(Self::Base64),
            "HEX" => Some(Self::Hex),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::AlphaNumeric => "AN",
            Self::Base64 => "BASE64",
            Self::Hex => "HEX",
        }
    }
}

/// Re-encoding applied to an internal value before it is emitted.
///
/// Stored internal values are hex text. `None` and `Hex` emit them verbatim;
/// `Base64` and `Base58` decode the hex and re-encode the bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum InternalTransform {
    #[default]
    None,
    Hex,
    Base64,
    Base58,
}

impl InternalTransform {
    /// Unknown or absent tags mean no transform.
    fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("HEX") => Self::Hex,
            Some("BASE64") => Self::Base64,
            Some("BASE58") => Self::Base58,
            _ => Self::None,
        }
    }

    fn tag(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Hex => Some("HEX"),
            Self::Base64 => Some("BASE64"),
            Self::Base58 => Some("BASE58"),
        }
    }
}

/// A typed placeholder.
///
/// Equality is structural. Two `Generate` points with the same category,
/// length, and key are the same generation request and receive the same value
/// within one injection pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InjectionPoint {
    /// A random token generated at injection time.
    #[serde(rename = "GeneratePoint")]
    Generate {
        category: GenerateCategory,
        length: usize,
        /// Label for humans; not used to resolve the value.
        key: String,
    },
    /// A value the operator must supply.
    #[serde(rename = "PromptPoint")]
    Prompt { key: String },
    /// A field of the internal configuration document.
    #[serde(rename = "InternalPoint")]
    Internal {
        #[serde(rename = "key")]
        path: String,
        transform: InternalTransform,
    },
}

impl InjectionPoint {
    /// Parse the interior of a placeholder, e.g. `PROMPT:DB_USER`.
    ///
    /// Trailing fields beyond those a variant uses are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionPointError::Malformed`] for an unknown kind or
    /// category, a missing or empty field, or a length that is not an integer
    /// in `1..=MAX_TOKEN_LENGTH`.
    pub fn parse(text: &str) -> Result<Self, InjectionPointError> {
        let fields: Vec<&str> = text.split(':').map(str::trim).collect();
        let malformed = |reason: &str| InjectionPointError::Malformed {
            raw: text.to_owned(),
            reason: reason.to_owned(),
        };

        match fields.as_slice() {
            ["GENERATE", rest @ ..] => {
                let [category, length, key, ..] = rest else {
                    return Err(malformed("GENERATE needs category, length and key"));
                };
                let category = GenerateCategory::from_tag(category)
                    .ok_or_else(|| malformed("unknown generate category"))?;
                let length = length
                    .parse::<usize>()
                    .map_err(|_| malformed("length is not a non-negative integer"))?;
                if length == 0 || length > MAX_TOKEN_LENGTH {
                    return Err(malformed("length out of range"));
                }
                Ok(Self::Generate {
                    category,
                    length,
                    key: non_empty(key).ok_or_else(|| malformed("empty key"))?,
                })
            }
            ["PROMPT", key, ..] => Ok(Self::Prompt {
                key: non_empty(key).ok_or_else(|| malformed("empty key"))?,
            }),
            ["INTERNAL", path, rest @ ..] => Ok(Self::Internal {
                path: non_empty(path).ok_or_else(|| malformed("empty path"))?,
                transform: InternalTransform::from_tag(rest.first().copied()),
            }),
            ["PROMPT" | "INTERNAL"] => Err(malformed("missing fields")),
            _ => Err(malformed("unknown injection point type")),
        }
    }

    /// The prompt key, if this is a `Prompt` point.
    pub fn prompt_key(&self) -> Option<&str> {
        match self {
            Self::Prompt { key } => Some(key),
            Self::Generate { .. } | Self::Internal { .. } => None,
        }
    }
}

/// Split an internal path into lookup segments.
///
/// Both `SUBKEY_PRIVATE` and `SUBKEY.PRIVATE` address the same field.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['_', '.'])
}

fn non_empty(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_owned())
}

impl FromStr for InjectionPoint {
    type Err = InjectionPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders the canonical placeholder text, markers included.
impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate {
                category,
                length,
                key,
            } => write!(f, "{{{{GENERATE:{}:{length}:{key}}}}}", category.tag()),
            Self::Prompt { key } => write!(f, "{{{{PROMPT:{key}}}}}"),
            Self::Internal { path, transform } => match transform.tag() {
                Some(tag) => write!(f, "{{{{INTERNAL:{path}:{tag}}}}}"),
                None => write!(f, "{{{{INTERNAL:{path}}}}}"),
            },
        }
    }
}
