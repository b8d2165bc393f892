//! Error types for `stowage-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Resolution errors never include resolved values, only the
//! placeholder key or path that failed.

/// Errors from parsing the interior of a `{{…}}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionPointError {
    /// The placeholder text does not match any known injection point shape.
    #[error("malformed injection point '{raw}': {reason}")]
    Malformed { raw: String, reason: String },
}

/// Errors from the secure token generator.
///
/// `InvalidLength` and `OddHexLength` indicate a caller bug, not bad input.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// A zero-length token was requested.
    #[error("invalid token length: {length}")]
    InvalidLength { length: usize },

    /// Hex tokens are two characters per byte.
    #[error("hex token length must be even, got {length}")]
    OddHexLength { length: usize },

    /// The operating system entropy source failed.
    #[error("entropy source unavailable: {reason}")]
    Entropy { reason: String },
}

/// Reasons a `Prompt` or `Internal` placeholder could not be resolved.
///
/// These never escape [`crate::injector::Injector::inject`]: the placeholder
/// is left in place and later reported by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No prompt value was supplied for the key.
    #[error("no prompt value for '{key}'")]
    MissingPrompt { key: String },

    /// A path segment does not exist or the parent is not an object.
    #[error("internal path '{path}' not found at segment '{segment}'")]
    PathNotFound { path: String, segment: String },

    /// The path resolved to a non-string value.
    #[error("internal path '{path}' does not hold a string")]
    NotAString { path: String },

    /// A re-encoding transform was requested on a value that is not hex.
    #[error("internal path '{path}' is not valid hex: {reason}")]
    InvalidTransformInput { path: String, reason: String },
}

/// Errors from a full injection pass.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// A `Generate` placeholder could not be satisfied.
    #[error("failed to generate value for '{placeholder}': {source}")]
    Generator {
        placeholder: String,
        #[source]
        source: GeneratorError,
    },
}
