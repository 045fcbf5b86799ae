//! Error types for the pipeline and the engine bridge.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::state::PipelineStage;

/// Failures of the numeric stages. Recoverable: the caller reports them and
/// carries on with other columns or stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Zero variance, singular system, or too little data for the statistic.
    #[error("degenerate input: {0}")]
    Degenerate(String),
}

/// Failures talking to the external analysis engine. Terminal for one call.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no project root among {candidates:?} (looked for {markers:?})")]
    RootNotFound {
        candidates: Vec<PathBuf>,
        markers: Vec<String>,
    },

    #[error("engine executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("engine exited with {code:?}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    ProcessExecutionFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("unexpected engine response: {0}")]
    ProtocolError(String),

    #[error("engine reported {code}: {message}")]
    ApplicationError { code: String, message: String },

    #[error("engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by [`crate::state::apply`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("no dataset loaded")]
    NoDataset,

    #[error("{operation} requires {required:?} for column {column}")]
    StageNotReady {
        operation: &'static str,
        required: PipelineStage,
        column: usize,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
