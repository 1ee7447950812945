//! Error types for hitreduce-core.

use thiserror::Error;

/// Result type alias for hitreduce operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hitreduce operations.
///
/// Reduction stages never fail on well-formed hits; these errors surface
/// only when geometry or configuration is loaded and validated.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid detector plane identifier.
    #[error("invalid plane id: {0}")]
    InvalidPlane(u16),

    /// Geometry description failed validation.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while loading a geometry or configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a geometry or configuration file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
