//=====================================================
// File: tests/engine_tests.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Whole-program sessions over a recording engine
// Objective: Confirm the engine runs once with every dependency, and never
//            when any import fails
//=====================================================

use nako_loader::{
    DependencySet, ExecMode, ImportScanner, Importer, LoaderConfig, ModuleReference,
    PluginExports, PluginRegistry, ScriptEngine, Session, SessionError,
};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[derive(Debug, Default)]
struct RecordingEngine {
    scanner: ImportScanner,
    runs: Vec<(ExecMode, usize)>,
    fail: bool,
}

impl ScriptEngine for RecordingEngine {
    fn find_imports(&self, code: &str, filename: Option<&Path>) -> Vec<ModuleReference> {
        self.scanner.scan(code, filename)
    }

    fn execute(
        &mut self,
        mode: ExecMode,
        _code: &str,
        _filename: Option<&Path>,
        deps: &DependencySet,
    ) -> anyhow::Result<()> {
        self.runs.push((mode, deps.len()));
        if self.fail {
            anyhow::bail!("syntax error");
        }
        Ok(())
    }
}

fn importer(project: &Path, registry: PluginRegistry) -> Importer {
    Importer::new(
        LoaderConfig::new(project.join("install")).with_working_dir(project),
        Arc::new(registry),
    )
}

fn program(project: &Path) -> PathBuf {
    project.join("main.nako3")
}

#[tokio::test]
async fn engine_runs_once_after_all_dependencies_load() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("plugin_csv.mjs"), "").unwrap();
    fs::write(dir.path().join("util.nako3"), "●便利とは").unwrap();
    let registry = PluginRegistry::new();
    registry.register_exports("plugin_csv.mjs", PluginExports::new("csv", &[]));

    let code = "!「plugin_csv.mjs」を取り込む\n!「util.nako3」を取り込む\n「OK」を表示";
    let mut session = Session::new(RecordingEngine::default(), importer(dir.path(), registry));
    let file = program(dir.path());
    let deps = session
        .run_source(ExecMode::Test, code, Some(&file))
        .await
        .unwrap();

    assert_eq!(deps.len(), 2);
    assert_eq!(session.engine().runs, vec![(ExecMode::Test, 2)]);
}

#[tokio::test]
async fn engine_is_not_called_when_an_import_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("util.nako3"), "").unwrap();

    let code = "!「util.nako3」を取り込む\n!「missing.nako3」を取り込む";
    let mut session = Session::new(
        RecordingEngine::default(),
        importer(dir.path(), PluginRegistry::new()),
    );
    let file = program(dir.path());
    let err = session
        .run_source(ExecMode::Run, code, Some(&file))
        .await
        .unwrap_err();

    match err {
        SessionError::Import(import) => {
            assert_eq!(import.line, 2);
            assert_eq!(import.file.as_deref(), Some(file.as_path()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.engine().runs.is_empty());
}

#[tokio::test]
async fn unresolvable_plugin_stops_before_the_engine() {
    let dir = tempdir().unwrap();
    let mut session = Session::new(
        RecordingEngine::default(),
        importer(dir.path(), PluginRegistry::new()),
    );
    let file = program(dir.path());
    let err = session
        .run_source(ExecMode::Compile, "!「plugin_nothing.mjs」を取り込む", Some(&file))
        .await
        .unwrap_err();
    let SessionError::Import(import) = err else {
        panic!("expected an import error");
    };
    assert!(import.trace().is_some());
    assert!(session.engine().runs.is_empty());
}

#[test]
fn engine_failure_is_reported_with_mode() {
    let dir = tempdir().unwrap();
    let engine = RecordingEngine {
        fail: true,
        ..RecordingEngine::default()
    };
    let mut session = Session::new(engine, importer(dir.path(), PluginRegistry::new()));
    let err = session
        .run_source_blocking(ExecMode::Compile, "「こんにちは」を表示", None)
        .unwrap_err();
    assert!(matches!(err, SessionError::Engine { mode: ExecMode::Compile, .. }));
    assert_eq!(err.to_string(), "compile failed: syntax error");
    assert_eq!(session.engine().runs, vec![(ExecMode::Compile, 0)]);
}

/// Loopback server: `/slow.nako3` answers after `delay`, everything else 404.
fn serve_slow(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            thread::spawn(move || {
                let mut head = Vec::new();
                let mut buf = [0u8; 512];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let response = if String::from_utf8_lossy(&head).contains("/slow.nako3 ") {
                    thread::sleep(delay);
                    "HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nslow"
                } else {
                    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                };
                let _ = stream.write_all(response.as_bytes());
            });
        }
    });
    format!("http://{addr}")
}

#[test]
fn blocking_session_fails_without_waiting_for_slow_imports() {
    let base = serve_slow(Duration::from_secs(3));
    let dir = tempdir().unwrap();
    let code = format!("!「{base}/slow.nako3」を取り込む\n!「{base}/bad.nako3」を取り込む");
    let mut session = Session::new(
        RecordingEngine::default(),
        importer(dir.path(), PluginRegistry::new()),
    );
    let file = program(dir.path());

    let started = Instant::now();
    let err = session
        .run_source_blocking(ExecMode::Run, &code, Some(&file))
        .unwrap_err();
    let elapsed = started.elapsed();

    let SessionError::Import(import) = err else {
        panic!("expected an import error");
    };
    assert_eq!(import.status(), Some(404));
    assert_eq!(import.line, 2);
    assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    assert!(session.engine().runs.is_empty());
}
