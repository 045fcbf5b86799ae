//! Out-of-process analysis engine.
//!
//! ```text
//!   AnalysisRequest ──► JSON ──► <engine> [script] <json>
//!                                   │
//!           stdout ◄────────────────┤ (payload)
//!           stderr ◄────────────────┘ (diagnostics)
//!              │
//!              ▼
//!   AnalysisResult | ApplicationError | ProtocolError
//! ```

pub mod paths;
pub mod process;
pub mod protocol;

pub use paths::{resolve_engine, resolve_root, EngineCommand, EngineMode, Platform};
pub use process::{AnalysisClient, CancellationToken, ProcessBridge};
pub use protocol::{AnalysisRequest, AnalysisResult, SeriesData};
