//! Secure token generator for `GENERATE` placeholders.
//!
//! Every token is drawn from the operating system CSPRNG via `getrandom`.
//! The generator is stateless: consistency of a repeated placeholder inside
//! one document is the injector's job, not this module's.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::GeneratorError;
use crate::point::GenerateCategory;

/// Alphabet for [`alpha_numeric`] tokens.
const ALPHA_NUMERIC: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Longest token a placeholder may request.
pub const MAX_TOKEN_LENGTH: usize = 4096;

/// Largest multiple of 62 that fits in a byte. Bytes at or above this are
/// rejected so every character is equally likely.
const ACCEPT_BELOW: u8 = 248;

/// Generate a token of `length` characters for the given category.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidLength`] for a zero length or one above
/// [`MAX_TOKEN_LENGTH`],
/// [`GeneratorError::OddHexLength`] for an odd hex length, and
/// [`GeneratorError::Entropy`] if the OS RNG fails.
pub fn generate(category: GenerateCategory, length: usize) -> Result<String, GeneratorError> {
    match category {
        GenerateCategory::AlphaNumeric => alpha_numeric(length),
        GenerateCategory::Base64 => base64(length),
        GenerateCategory::Hex => hex(length),
    }
}

/// Generate `length` characters uniformly from `A-Z`, `a-z`, `0-9`.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidLength`] if `length` is out of range, or
/// [`GeneratorError::Entropy`] if the OS RNG fails.
pub fn alpha_numeric(length: usize) -> Result<String, GeneratorError> {
    ensure_length(length)?;

    let mut out = String::with_capacity(length);
    let mut buf = vec![0u8; length];
    while out.len() < length {
        fill(&mut buf)?;
        for &b in &buf {
            if b >= ACCEPT_BELOW {
                continue;
            }
            out.push(char::from(ALPHA_NUMERIC[usize::from(b % 62)]));
            if out.len() == length {
                break;
            }
        }
    }
    Ok(out)
}

/// Generate a standard base64 string of exactly `length` characters.
///
/// Enough bytes are drawn that truncation never reaches the `=` padding.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidLength`] if `length` is out of range, or
/// [`GeneratorError::Entropy`] if the OS RNG fails.
pub fn base64(length: usize) -> Result<String, GeneratorError> {
    ensure_length(length)?;

    let mut bytes = vec![0u8; (length * 3).div_ceil(4)];
    fill(&mut bytes)?;
    let mut encoded = STANDARD.encode(&bytes);
    encoded.truncate(length);
    Ok(encoded)
}

/// Generate a lower-case hex string of exactly `length` characters.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidLength`] if `length` is out of range,
/// [`GeneratorError::OddHexLength`] if it is odd, or
/// [`GeneratorError::Entropy`] if the OS RNG fails.
pub fn hex(length: usize) -> Result<String, GeneratorError> {
    ensure_length(length)?;
    if length % 2 != 0 {
        return Err(GeneratorError::OddHexLength { length });
    }

    let mut bytes = vec![0u8; length / 2];
    fill(&mut bytes)?;
    Ok(hex::encode(bytes))
}

fn ensure_length(length: usize) -> Result<(), GeneratorError> {
    if length == 0 || length > MAX_TOKEN_LENGTH {
        return Err(GeneratorError::InvalidLength { length });
    }
    Ok(())
}

fn fill(buf: &mut [u8]) -> Result<(), GeneratorError> {
    getrandom::fill(buf).map_err(|e| GeneratorError::Entropy {
        reason: e.to_string(),
    })
}
