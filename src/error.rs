//! Error types for the math-roundtrip library.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that occur while parsing an HTML fragment.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Input is {size} bytes, larger than the {limit} byte limit")]
    InputTooLarge { size: usize, limit: usize },

    #[error("Elements nest more than {limit} levels deep")]
    TooDeep { limit: usize },

    #[error("Parsed document has no body element")]
    MissingBody,
}

/// Errors that occur while serializing a rewritten tree.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Serialization failed: {0}")]
    Serialize(#[from] std::io::Error),

    #[error("Serialized output is not valid UTF-8")]
    Utf8,
}

/// Errors in user-supplied configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(String),
}
