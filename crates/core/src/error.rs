/// Result alias that carries the custom [`LyrixError`] type.
pub type Result<T> = std::result::Result<T, LyrixError>;

/// Common error type for the core crate.
///
/// The synchronization engine itself never fails at runtime: malformed lyrics
/// degrade to plain text and out-of-range requests are clamped. Errors only
/// surface while loading configuration or reading lyric files.
#[derive(Debug, thiserror::Error)]
pub enum LyrixError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// A configuration value is outside of its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or timeline JSON could not be (de)serialized.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LyrixError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates an error for a configuration value that failed validation.
    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for LyrixError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LyrixError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
