//! command-pipeline: from utterance to robot motion
//!
//! Wires the phrase cache, the sequence interpreter and the executor into a
//! single [`CommandProcessor`], and turns a stream of partial and final
//! transcripts into dispatch actions with the [`Debouncer`].

mod error;
pub use error::{PipelineError, Result};

mod config;
pub use config::{Band, ConfidenceBands, DebounceConfig, PipelineConfig};

mod emergency;
pub use emergency::EmergencyDetector;

mod metrics;
pub use metrics::{CommandMetrics, MetricsHub};

mod outcome;
pub use outcome::{CommandOutcome, Origin, Route};

mod history;
pub use history::{CommandHistory, CommandRecord};

mod memory;
pub use memory::{MemorySummary, MemoryWriter};

mod processor;
pub use processor::CommandProcessor;

mod debounce;
pub use debounce::{Debouncer, DispatchAction, SpeechEvent};

#[cfg(test)]
mod testing;

/// Initialize the command pipeline system
pub fn init() -> Result<()> {
    tracing::info!("Initializing command pipeline system");
    Ok(())
}
