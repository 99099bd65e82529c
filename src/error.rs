//! Error types for the conversion pipeline

use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a document
///
/// Every error is terminal for the request that raised it. Nothing is
/// retried automatically.
#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported file type or empty input, raised before any processing
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Malformed vector markup or missing `<svg>` root
    #[error("SVG parse error: {0}")]
    ParseError(String),

    /// Image load or document capture failed
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The bitmap could not be encoded into the output format
    #[error("Image encoding failed: {0}")]
    EncodeError(String),

    /// Failed to start a document context backend
    #[error("Backend initialization failed: {0}")]
    InitializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short machine-friendly name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InputError(_) => "input",
            Error::ParseError(_) => "parse",
            Error::RenderError(_) | Error::EncodeError(_) => "render",
            Error::InitializationError(_) => "init",
            Error::ConfigError(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}
