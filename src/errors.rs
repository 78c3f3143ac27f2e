//=====================================================
// File: errors.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Error taxonomy for plugin resolution and dependency loading
// Objective: Carry the failing import's file and line alongside a readable
//            message, including the full probe trace on resolution failure
//=====================================================

use crate::resolver::probe::ProbeLog;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure surfaced to the engine for a single import statement.
#[derive(Debug)]
pub struct ImportError {
    pub kind: ImportErrorKind,
    pub file: Option<PathBuf>,
    pub line: u32,
}

impl ImportError {
    pub fn new(kind: ImportErrorKind, file: Option<&Path>, line: u32) -> Self {
        Self {
            kind,
            file: file.map(Path::to_path_buf),
            line,
        }
    }

    /// Probe trace attached to a resolution failure, if any.
    pub fn trace(&self) -> Option<&ProbeLog> {
        match &self.kind {
            ImportErrorKind::Resolution { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// HTTP status carried by a fetch failure.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ImportErrorKind::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // Display already renders `kind`; expose only what lies beneath it.
        std::error::Error::source(&self.kind)
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}: {}", file.display(), self.line, self.kind),
            None => write!(f, "line {}: {}", self.line, self.kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportErrorKind {
    #[error("native module '{name}' was not found; searched the following locations:\n{trace}")]
    Resolution { name: String, trace: ProbeLog },
    #[error("cannot resolve '{name}' without an importing file name")]
    MissingOrigin { name: String },
    #[error("{}", fetch_message(.url, .status, .reason))]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },
    #[error("module downloaded from '{url}' could not be written to {}: {source}", .path.display())]
    StagingWrite {
        url: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("module '{}' could not be loaded: {source}", .path.display())]
    DynamicLoad {
        path: PathBuf,
        #[source]
        source: CodeLoadError,
    },
    #[error("script '{}' could not be read: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },
    #[error("loader task aborted: {0}")]
    Aborted(String),
}

fn fetch_message(url: &str, status: &Option<u16>, reason: &str) -> String {
    match status {
        Some(code) => format!("download from '{url}' failed: {code} {reason}"),
        None => format!("download from '{url}' failed: {reason}"),
    }
}

/// Problems reading a `package.json` found during verification.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("package descriptor {} has no \"main\" entry", .path.display())]
    MissingMain { path: PathBuf },
    #[error("package descriptor {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("package descriptor {} could not be read: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raised by a [`crate::loader::native::CodeLoader`] implementation.
#[derive(Debug, Error)]
pub enum CodeLoadError {
    #[error("no native module registered for '{0}'")]
    Unregistered(String),
    #[error("missing file")]
    Missing,
    #[error("invalid plugin manifest: {0}")]
    Manifest(String),
    #[error("{0}")]
    Library(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unable to determine the working directory: {0}")]
    WorkingDir(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::probe::ProbeRecord;

    #[test]
    fn resolution_message_lists_every_probe() {
        let mut trace = ProbeLog::default();
        trace.push(ProbeRecord::new("origin directory", "/proj/x.mjs", false));
        trace.push(ProbeRecord::new("NAKO_LIB", "/lib/x.mjs", false));
        let err = ImportError::new(
            ImportErrorKind::Resolution {
                name: "x.mjs".into(),
                trace,
            },
            Some(Path::new("/proj/main.nako3")),
            3,
        );
        let text = err.to_string();
        assert!(text.starts_with("/proj/main.nako3:3: native module 'x.mjs' was not found"));
        assert!(text.contains("- (origin directory) /proj/x.mjs, false\n- (NAKO_LIB) /lib/x.mjs, false"));
    }

    #[test]
    fn fetch_error_reports_status() {
        let err = ImportError::new(
            ImportErrorKind::Fetch {
                url: "https://example.com/lib.nako3".into(),
                status: Some(404),
                reason: "Not Found".into(),
            },
            None,
            1,
        );
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404 Not Found"));
    }

    #[test]
    fn error_chain_does_not_repeat_the_message() {
        use std::error::Error as _;

        let resolution = ImportError::new(
            ImportErrorKind::Resolution {
                name: "x.mjs".into(),
                trace: ProbeLog::default(),
            },
            None,
            1,
        );
        assert!(resolution.source().is_none());

        let staging = ImportError::new(
            ImportErrorKind::StagingWrite {
                url: "https://example.com/x.mjs".into(),
                path: PathBuf::from("/tmp/x.mjs"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
            None,
            1,
        );
        let cause = staging.source().unwrap();
        assert_eq!(cause.to_string(), "denied");
    }
}

//=====================================================
// End of file
//=====================================================
