pub mod analysis;
pub mod bridge;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::PipelineConfig;
pub use error::{AnalysisError, BridgeError, PipelineError};
pub use state::{apply, Operation, PipelineStage, PipelineState};
