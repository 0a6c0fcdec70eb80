use thiserror::Error;

/// Macro to log an error with context before returning it.
/// Usage: `log_and_return!(error, "context message")`
#[macro_export]
macro_rules! log_and_return {
    ($error:expr, $context:expr) => {{
        $error.log_with_context($context);
        return Err($error);
    }};
}

/// Application-specific error types for the ingestion pipeline.
#[derive(Error, Debug)]
pub enum OrionError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Parser error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("External archive error: {0}")]
    ExternalApi(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for convenience.
pub type OrionResult<T> = Result<T, OrionError>;

impl From<config::ConfigError> for OrionError {
    fn from(err: config::ConfigError) -> Self {
        OrionError::Config(err.to_string())
    }
}

impl OrionError {
    pub fn graph<T: std::fmt::Display>(message: T) -> Self {
        OrionError::Graph(message.to_string())
    }

    pub fn parse<T: std::fmt::Display>(message: T) -> Self {
        OrionError::Parse(message.to_string())
    }

    pub fn not_found<T: std::fmt::Display>(resource: T) -> Self {
        OrionError::NotFound(format!("{} not found", resource))
    }

    /// Log the error with a severity appropriate to its variant.
    pub fn log_with_context(&self, context: &str) {
        match self {
            OrionError::Graph(_) | OrionError::ExternalApi(_) | OrionError::Queue(_) => {
                tracing::error!("{} - {}", context, self);
            }
            OrionError::RateLimit => {
                tracing::warn!("{} - {}", context, self);
            }
            OrionError::Parse(_) | OrionError::NotFound(_) => {
                tracing::info!("{} - {}", context, self);
            }
            _ => {
                tracing::error!("{} - {}", context, self);
            }
        }
    }
}
