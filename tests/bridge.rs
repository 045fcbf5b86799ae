#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use rusty_econ::bridge::protocol::ModelType;
use rusty_econ::bridge::{
    AnalysisClient, AnalysisRequest, CancellationToken, EngineCommand, ProcessBridge, SeriesData,
};
use rusty_econ::error::BridgeError;

const FIXTURE: &str = include_str!("fixtures/analysis_response.json");

/// Stand-in engine: `/bin/sh <dir>/main.sh <json>`.
fn engine(dir: &Path, body: &str) -> ProcessBridge {
    let script = dir.join("main.sh");
    std::fs::write(&script, body).unwrap();
    ProcessBridge::new(EngineCommand::new("/bin/sh").with_script(script))
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        series: vec![
            SeriesData { name: "gdp".into(), data: vec![101.5, 102.25, 103.0, 102.75] },
            SeriesData { name: "cpi".into(), data: vec![2.1, 2.3, 2.2, 2.4] },
            SeriesData { name: "rate".into(), data: vec![0.5, 0.5, 0.75, 1.0] },
        ],
        target_index: Some(1),
    }
}

fn fixture_file(dir: &Path) -> PathBuf {
    let path = dir.join("response.json");
    std::fs::write(&path, FIXTURE).unwrap();
    path
}

#[test]
fn nonzero_exit_carries_both_streams() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = engine(dir.path(), "echo 'partial output'\necho 'boom' >&2\nexit 1\n");
    match bridge.analyze(&request(), &CancellationToken::new()) {
        Err(BridgeError::ProcessExecutionFailed { code, stdout, stderr }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stdout, "partial output\n");
            assert_eq!(stderr, "boom\n");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn error_payload_is_structured() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = engine(
        dir.path(),
        "echo '{\"error\":\"bad_input\",\"message\":\"too few points\"}'\n",
    );
    match bridge.analyze(&request(), &CancellationToken::new()) {
        Err(BridgeError::ApplicationError { code, message }) => {
            assert_eq!(code, "bad_input");
            assert_eq!(message, "too few points");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn success_payload_is_decoded_despite_stderr_noise() {
    let dir = tempfile::tempdir().unwrap();
    let response = fixture_file(dir.path());
    let bridge = engine(
        dir.path(),
        &format!("echo 'warming up' >&2\ncat '{}'\n", response.display()),
    );
    let result = bridge.analyze(&request(), &CancellationToken::new()).unwrap();
    assert_eq!(result.model_type, ModelType::Mixed);
    assert_eq!(result.variable_names, vec!["gdp", "cpi"]);
}

#[test]
fn non_json_stdout_is_a_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = engine(dir.path(), "echo 'not json at all'\n");
    assert!(matches!(
        bridge.analyze(&request(), &CancellationToken::new()),
        Err(BridgeError::ProtocolError(_))
    ));
}

#[test]
fn request_is_the_last_positional_argument() {
    let dir = tempfile::tempdir().unwrap();
    let response = fixture_file(dir.path());
    let captured = dir.path().join("argv.json");
    let bridge = engine(
        dir.path(),
        &format!(
            "printf '%s' \"$1\" > '{}'\ncat '{}'\n",
            captured.display(),
            response.display()
        ),
    );
    bridge.analyze(&request(), &CancellationToken::new()).unwrap();

    let sent: AnalysisRequest =
        serde_json::from_str(&std::fs::read_to_string(&captured).unwrap()).unwrap();
    assert_eq!(sent, request());
    assert_eq!(sent.target_index, Some(1));
    assert_eq!(sent.series[2].name, "rate");
}

#[test]
fn slow_engine_times_out_and_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = engine(dir.path(), "exec sleep 5\n").with_timeout(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let err = bridge.analyze(&request(), &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn cancellation_stops_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = engine(dir.path(), "exec sleep 5\n").with_timeout(None);
    let cancel = CancellationToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.cancel();
    });
    let started = Instant::now();
    let err = bridge.analyze(&request(), &cancel).unwrap_err();
    canceller.join().unwrap();
    assert!(matches!(err, BridgeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn missing_engine_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("python_runtime/linux/stats_engine");
    let bridge = ProcessBridge::new(EngineCommand::new(&missing));
    match bridge.analyze(&request(), &CancellationToken::new()) {
        Err(BridgeError::ExecutableNotFound(path)) => assert_eq!(path, missing),
        other => panic!("unexpected {other:?}"),
    }
}
