//=====================================================
// File: resolver/probe.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Existence probing with a per-call cache and an ordered trace
// Objective: Avoid repeated stat calls inside one resolution while keeping
//            a row for every probe site so failures can list each location
//=====================================================

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub label: String,
    pub path: String,
    pub found: bool,
}

impl ProbeRecord {
    pub fn new(label: impl Into<String>, path: impl Into<String>, found: bool) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            found,
        }
    }
}

impl fmt::Display for ProbeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- ({}) {}, {}", self.label, self.path, self.found)
    }
}

/// Append-only trace of one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeLog {
    records: Vec<ProbeRecord>,
}

impl ProbeLog {
    pub fn push(&mut self, record: ProbeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ProbeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeRecord> {
        self.records.iter()
    }
}

impl fmt::Display for ProbeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, record) in self.records.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

/// Memoised "is a regular file" answers, keyed by the exact path probed.
///
/// Keys are compared byte for byte on every platform; no case folding is
/// applied even where the filesystem itself is case-insensitive.
#[derive(Debug, Default)]
pub struct ProbeCache {
    entries: HashMap<PathBuf, bool>,
    hits: usize,
}

impl ProbeCache {
    pub fn is_file(&mut self, path: &Path) -> bool {
        if let Some(found) = self.entries.get(path) {
            self.hits += 1;
            return *found;
        }
        let found = fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false);
        self.entries.insert(path.to_path_buf(), found);
        found
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The cache and trace owned by a single resolution call.
#[derive(Debug, Default)]
pub struct ProbeSession {
    cache: ProbeCache,
    log: ProbeLog,
}

impl ProbeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `path` and record the outcome under `label`.
    pub fn check(&mut self, path: &Path, label: &str) -> bool {
        let found = self.cache.is_file(path);
        tracing::debug!(label, path = %path.display(), found, "probe");
        self.log
            .push(ProbeRecord::new(label, path.display().to_string(), found));
        found
    }

    pub fn log(&self) -> &ProbeLog {
        &self.log
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub fn into_log(self) -> ProbeLog {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn repeated_probe_hits_cache_but_still_logs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plugin_a.mjs");
        fs::write(&file, "export default {}").unwrap();

        let mut session = ProbeSession::new();
        assert!(session.check(&file, "first"));
        assert!(session.check(&file, "second"));
        assert_eq!(session.cache().hits(), 1);
        assert_eq!(session.cache().len(), 1);
        assert_eq!(session.log().len(), 2);
        assert_eq!(session.log().records()[0].path, session.log().records()[1].path);
        assert!(session.log().iter().all(|record| record.found));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempdir().unwrap();
        let mut session = ProbeSession::new();
        assert!(!session.check(dir.path(), "dir"));
        assert!(!session.check(&dir.path().join("missing.mjs"), "missing"));
    }

    #[test]
    fn fresh_session_sees_new_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("late.mjs");
        let mut first = ProbeSession::new();
        assert!(!first.check(&file, "before"));
        fs::write(&file, "").unwrap();
        let mut second = ProbeSession::new();
        assert!(second.check(&file, "after"));
    }

    #[test]
    fn log_renders_one_line_per_probe() {
        let mut log = ProbeLog::default();
        log.push(ProbeRecord::new("a", "/x", false));
        log.push(ProbeRecord::new("b", "/y", true));
        assert_eq!(log.to_string(), "- (a) /x, false\n- (b) /y, true");
    }
}
