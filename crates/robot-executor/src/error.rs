use actuator_link::LinkError;
use instruction_set::RegistryError;
use thiserror::Error;

pub type Result<T, E = ExecError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no executor for instruction: {0}")]
    NoExecutor(String),
    #[error("{instruction}: missing parameter '{param}'")]
    MissingParam {
        instruction: &'static str,
        param: &'static str,
    },
    #[error("unknown location: {0}")]
    UnknownLocation(String),
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("unknown direction: {0}")]
    UnknownDirection(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("emergency halt is active")]
    Halted,
    #[error("actuator link: {0}")]
    Link(LinkError),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("step {index} ({instruction}) failed: {source}")]
    Step {
        index: usize,
        instruction: String,
        #[source]
        source: Box<ExecError>,
    },
}

impl From<LinkError> for ExecError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Halted => ExecError::Halted,
            other => ExecError::Link(other),
        }
    }
}

impl ExecError {
    /// The underlying cause, unwrapping plan-level context.
    pub fn root(&self) -> &ExecError {
        match self {
            ExecError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}
