use instruction_set::RegistryError;
use phrase_cache::CacheError;
use robot_executor::ExecError;
use thiserror::Error;

pub type Result<T, E = PipelineError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("execution: {0}")]
    Exec(#[from] ExecError),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("phrase bank: {0}")]
    Cache(#[from] CacheError),
    #[error("history log {path}: {message}")]
    History { path: String, message: String },
    #[error("metrics init error: {0}")]
    Metrics(String),
    #[error("executor task failed: {0}")]
    Join(String),
}
