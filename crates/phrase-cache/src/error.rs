use thiserror::Error;

pub type Result<T, E = CacheError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to persist phrase bank {path}: {message}")]
    Persist { path: String, message: String },
}
