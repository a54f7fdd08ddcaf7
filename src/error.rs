//! Error types for the authenticity-fusion crate.

/// Errors that can occur while building inputs for fusion or writing reports.
///
/// Degenerate numeric inputs (blank masks, uniform maps, zero denominators)
/// are not errors; they resolve to well-defined scores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A map or request violates a basic precondition (ragged rows, zero
    /// dimensions, data length not matching the declared shape).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two maps that must share a shape do not.
    #[error("shape mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ShapeMismatch {
        /// Expected `(width, height)`.
        expected: (usize, usize),
        /// Actual `(width, height)`.
        actual: (usize, usize),
    },

    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A request or report could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while encoding or decoding a raster map.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
