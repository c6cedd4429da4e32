use thiserror::Error;

pub type Result<T, E = ModelError> = core::result::Result<T, E>;

/// Failure of a single language-model call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("rate limited or overloaded: {0}")]
    RateLimited(String),
    #[error("model call timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Api(String),
    #[error("model backend not configured: {0}")]
    Config(String),
}

impl ModelError {
    /// Message shown or spoken to the user when a call fails.
    pub fn user_feedback(&self) -> String {
        match self {
            ModelError::RateLimited(_) => {
                "API rate limit or overloaded, try again in a moment".to_string()
            }
            ModelError::Timeout(_) => "API call timed out, check connection or try again".to_string(),
            ModelError::Api(msg) | ModelError::Config(msg) => format!("API error: {msg}"),
        }
    }
}
