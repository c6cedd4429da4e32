use thiserror::Error;

pub type Result<T, E = LinkError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("encode error: {0}")]
    Encode(String),
    #[error("emergency halt is active")]
    Halted,
}

impl LinkError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
