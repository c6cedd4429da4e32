use thiserror::Error;

pub type Result<T, E = RegistryError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to persist {path}: {message}")]
    Persist { path: String, message: String },
    #[error("unknown location: {0}")]
    UnknownLocation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("cyclic instruction definition: {chain}")]
    Cyclic { chain: String },
    #[error("instruction expansion deeper than {limit} levels at {name}")]
    DepthExceeded { name: String, limit: usize },
}
