//=====================================================
// File: loader/staging.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Local staging of remotely hosted native plugins
// Objective: Write downloads to a file named after the URL so the code
//            loader, which only accepts local files, can open them
//=====================================================

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingCacheEntry {
    pub source_url: String,
    pub local_path: PathBuf,
}

/// Staged downloads for the current run. Entries are never evicted and a
/// later download of the same URL overwrites the file in place.
#[derive(Debug)]
pub struct RemoteStagingCache {
    dir: PathBuf,
    entries: Mutex<BTreeMap<String, PathBuf>>,
}

impl RemoteStagingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<staging dir>/<url with [^A-Za-z0-9_.] replaced by '_'>`.
    pub fn staging_path(&self, url: &str) -> PathBuf {
        self.dir.join(sanitize(url))
    }

    /// Persist `bytes` for `url`, creating the staging directory when needed.
    ///
    /// The body is written to a temporary file beside the target and renamed
    /// into place, so a reader never sees a partially written plugin.
    pub async fn stage(&self, url: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.staging_path(url);
        let dir = self.dir.clone();
        let target = path.clone();
        let body = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_replacing(&dir, &target, &body))
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(url, path = %path.display(), size = bytes.len(), "staged remote module");
        self.entries.lock().insert(url.to_string(), path.clone());
        Ok(path)
    }

    pub fn get(&self, url: &str) -> Option<PathBuf> {
        self.entries.lock().get(url).cloned()
    }

    pub fn entries(&self) -> Vec<StagingCacheEntry> {
        self.entries
            .lock()
            .iter()
            .map(|(url, path)| StagingCacheEntry {
                source_url: url.clone(),
                local_path: path.clone(),
            })
            .collect()
    }
}

fn write_replacing(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(target).map_err(|err| err.error)?;
    Ok(())
}

pub fn sanitize(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn url_is_flattened_into_a_file_name() {
        assert_eq!(
            sanitize("https://example.com/p/plugin_x.mjs?v=2"),
            "https___example.com_p_plugin_x.mjs_v_2"
        );
    }

    #[tokio::test]
    async fn stage_creates_directory_and_overwrites() {
        let root = tempdir().unwrap();
        let cache = RemoteStagingCache::new(root.path().join("deep").join("staging"));
        let url = "https://example.com/plugin_x.mjs";

        let first = cache.stage(url, b"one").await.unwrap();
        let second = cache.stage(url, b"two").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert_eq!(cache.get(url), Some(second.clone()));
        assert_eq!(
            cache.entries(),
            vec![StagingCacheEntry {
                source_url: url.to_string(),
                local_path: second,
            }]
        );
    }

    #[tokio::test]
    async fn concurrent_stages_of_one_url_never_interleave() {
        let root = tempdir().unwrap();
        let cache = RemoteStagingCache::new(root.path());
        let url = "https://example.com/plugin_x.mjs";
        let first = vec![b'a'; 256 * 1024];
        let second = vec![b'b'; 256 * 1024];

        let (left, right) = tokio::join!(cache.stage(url, &first), cache.stage(url, &second));
        let path = left.unwrap();
        assert_eq!(path, right.unwrap());

        let staged = std::fs::read(&path).unwrap();
        assert!(staged == first || staged == second);
        let names: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("https___example.com_plugin_x.mjs")]);
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let cache = RemoteStagingCache::new(blocker.join("staging"));
        assert!(cache.stage("https://example.com/a.mjs", b"").await.is_err());
    }
}
