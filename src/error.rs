//! Error types for page capture and bundling

use thiserror::Error;

/// Result type alias for capture and bundling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a conversion.
///
/// Per-resource fetch failures are never represented here; they are absorbed
/// by the inliner as [`crate::fetch::SkipReason`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch the browser or build the fetch layer
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// Navigation failed before any document could be loaded
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Nothing could be extracted from the page after all fallbacks
    #[error("empty content: {0}")]
    EmptyContent(String),

    /// Invalid input or configuration (malformed URL, unknown locale, bad config file)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The browser rejected a DevTools command
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Failed to persist a bundle
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::ConfigError(format!("invalid URL: {}", err))
    }
}
