use crate::{render::RenderError, RouteId};

/// Result alias that carries the custom [`RevealError`] type.
pub type Result<T> = std::result::Result<T, RevealError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    /// Free-form failure that does not belong to a more specific category.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("request failed: {0}")]
    Http(#[from] ureq::Error),
    /// A required option is missing or could not be parsed. Only the feature
    /// depending on the option is disabled.
    #[error("configuration error: {0}")]
    Config(String),
    /// The route cannot be animated and is skipped.
    #[error("route {route} skipped: {reason}")]
    InvalidGeometry { route: RouteId, reason: String },
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl RevealError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<&str> for RevealError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RevealError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
