use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::BridgeError;

/// Directories whose presence marks the engine's project root.
pub const ROOT_MARKERS: [&str; 2] = ["python_runtime", "python_engine"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Frozen engine binary.
    Production,
    /// Interpreter from the engine's virtualenv running `main.py`.
    Development,
}

/// Program plus the arguments placed before the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub leading_args: Vec<PathBuf>,
    pub mode: EngineMode,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            mode: EngineMode::Production,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.leading_args.push(script.into());
        self.mode = EngineMode::Development;
        self
    }
}

// ---------------------------------------------------------------------------
// Root discovery
// ---------------------------------------------------------------------------

/// First candidate directory containing any of `markers`.
pub fn resolve_root(candidates: &[PathBuf], markers: &[&str]) -> Result<PathBuf, BridgeError> {
    for dir in candidates {
        if markers.iter().any(|m| dir.join(m).is_dir()) {
            debug!("engine root: {}", dir.display());
            return Ok(dir.clone());
        }
    }
    Err(BridgeError::RootNotFound {
        candidates: candidates.to_vec(),
        markers: markers.iter().map(|m| m.to_string()).collect(),
    })
}

/// `start` and its first two ancestors.
pub fn default_candidates(start: &Path) -> Vec<PathBuf> {
    start.ancestors().take(3).map(Path::to_path_buf).collect()
}

// ---------------------------------------------------------------------------
// Executable discovery
// ---------------------------------------------------------------------------

pub fn production_binary(root: &Path, platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows => root.join("python_runtime").join("windows").join("stats_engine.exe"),
        Platform::Unix => root.join("python_runtime").join("linux").join("stats_engine"),
    }
}

pub fn development_interpreter(root: &Path, platform: Platform) -> PathBuf {
    let venv = root.join("python_engine").join("venv");
    match platform {
        Platform::Windows => venv.join("Scripts").join("python.exe"),
        Platform::Unix => venv.join("bin").join("python"),
    }
}

pub fn development_script(root: &Path) -> PathBuf {
    root.join("python_engine").join("main.py")
}

/// Production binary if it exists, otherwise the development interpreter
/// with its script. The returned program is not checked for existence.
pub fn resolve_engine(root: &Path, platform: Platform) -> EngineCommand {
    let prod = production_binary(root, platform);
    let command = if prod.is_file() {
        EngineCommand::new(prod)
    } else {
        EngineCommand::new(development_interpreter(root, platform))
            .with_script(development_script(root))
    };
    info!(
        "engine ({:?}): {}",
        command.mode,
        command.program.display()
    );
    command
}
