use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::paths::{default_candidates, resolve_engine, resolve_root, EngineCommand, Platform, ROOT_MARKERS};
use super::protocol::{decode_response, AnalysisRequest, AnalysisResult};
use crate::config::BridgeConfig;
use crate::error::BridgeError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag checked while the engine runs. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Client seam
// ---------------------------------------------------------------------------

/// Anything that can turn a request into an engine result.
pub trait AnalysisClient {
    fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, BridgeError>;
}

/// Runs the engine as a child process, one process per request.
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    command: EngineCommand,
    timeout: Option<Duration>,
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl ProcessBridge {
    pub fn new(command: EngineCommand) -> Self {
        Self {
            command,
            timeout: BridgeConfig::default().timeout(),
        }
    }

    /// `None` waits for the engine indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Locate the engine from `config.project_root`, or by probing the
    /// working directory and its parents.
    pub fn discover(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let root = match &config.project_root {
            Some(root) => resolve_root(std::slice::from_ref(root), &ROOT_MARKERS)?,
            None => {
                let cwd = std::env::current_dir()?;
                resolve_root(&default_candidates(&cwd), &ROOT_MARKERS)?
            }
        };
        info!("engine root: {}", root.display());
        let command = resolve_engine(&root, Platform::current());
        Ok(Self::new(command).with_timeout(config.timeout()))
    }

    pub fn command(&self) -> &EngineCommand {
        &self.command
    }

    fn spawn(&self, payload: &str) -> Result<Child, BridgeError> {
        if !self.command.program.is_file() {
            return Err(BridgeError::ExecutableNotFound(self.command.program.clone()));
        }
        Command::new(&self.command.program)
            .args(&self.command.leading_args)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    BridgeError::ExecutableNotFound(self.command.program.clone())
                }
                _ => BridgeError::Io(e),
            })
    }

    fn run(&self, payload: &str, cancel: &CancellationToken) -> Result<ProcessOutput, BridgeError> {
        let mut child = self.spawn(payload)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let started = Instant::now();

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                stop(&mut child);
                return Err(BridgeError::Cancelled);
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    stop(&mut child);
                    return Err(BridgeError::Timeout(limit));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };
        debug!("engine exited with {status} after {:?}", started.elapsed());

        Ok(ProcessOutput {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        })
    }
}

/// Read a child pipe to the end on its own thread so neither stream can
/// fill up and block the engine.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

fn collect(reader: JoinHandle<io::Result<String>>) -> Result<String, BridgeError> {
    let text = reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))?;
    Ok(text)
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("failed to kill engine: {e}");
    }
    let _ = child.wait();
}

impl AnalysisClient for ProcessBridge {
    fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, BridgeError> {
        request.validate()?;
        let payload = request.to_json()?;
        info!(
            "calling engine with {} series of {} points",
            request.series.len(),
            request.series.first().map_or(0, |s| s.data.len())
        );

        let output = self.run(&payload, cancel)?;
        if !output.stderr.trim().is_empty() {
            debug!("engine stderr:\n{}", output.stderr.trim_end());
        }
        if !output.status.success() {
            return Err(BridgeError::ProcessExecutionFailed {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        decode_response(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::SeriesData;

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    /// Yields a few bytes, then fails like a broken pipe.
    struct BrokenPipe {
        sent: bool,
    }

    impl Read for BrokenPipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.sent = true;
            buf[..2].copy_from_slice(b"{\"");
            Ok(2)
        }
    }

    #[test]
    fn pipe_read_failure_is_an_io_error() {
        let err = collect(drain(Some(BrokenPipe { sent: false }))).unwrap_err();
        assert!(matches!(err, BridgeError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn drained_pipe_is_returned_whole() {
        let text = collect(drain(Some(&b"{\"ok\": true}\n"[..]))).unwrap();
        assert_eq!(text, "{\"ok\": true}\n");
        assert_eq!(collect(drain(None::<&[u8]>)).unwrap(), "");
    }

    #[test]
    fn missing_program_is_reported_before_spawning() {
        let bridge = ProcessBridge::new(EngineCommand::new("/definitely/not/here/stats_engine"));
        let req = AnalysisRequest {
            series: vec![SeriesData { name: "x".into(), data: vec![1.0] }],
            target_index: None,
        };
        let err = bridge.analyze(&req, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BridgeError::ExecutableNotFound(_)));
    }

    #[test]
    fn invalid_request_never_reaches_the_engine() {
        let bridge = ProcessBridge::new(EngineCommand::new("/definitely/not/here/stats_engine"));
        let req = AnalysisRequest { series: vec![], target_index: None };
        let err = bridge.analyze(&req, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }
}
