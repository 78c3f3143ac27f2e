//=====================================================
// File: loader/native.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host capability for turning a local file into a plugin factory
// Objective: Keep dynamic loading behind one trait, with an in-process
//            plugin table and an optional shared-library backend
//=====================================================

use crate::errors::CodeLoadError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a native plugin exposes to the scripted language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginExports {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

impl PluginExports {
    pub fn new(name: impl Into<String>, functions: &[&str]) -> Self {
        Self {
            name: name.into(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }
}

type Builder = Arc<dyn Fn() -> PluginExports + Send + Sync>;

/// Exported factory of a loaded native module.
#[derive(Clone)]
pub struct PluginFactory {
    source: PathBuf,
    build: Builder,
}

impl PluginFactory {
    pub fn new<F>(source: impl Into<PathBuf>, build: F) -> Self
    where
        F: Fn() -> PluginExports + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            build: Arc::new(build),
        }
    }

    /// File the factory was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn instantiate(&self) -> PluginExports {
        (self.build)()
    }
}

impl fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait CodeLoader: Send + Sync {
    /// Load the file at `path` and return its exported factory.
    async fn load_code(&self, path: &Path) -> Result<PluginFactory, CodeLoadError>;
}

/// In-process module table keyed by plugin file name.
///
/// A staged copy of a remote plugin (`https___host_plugin_x.mjs`) matches
/// the registration for `plugin_x.mjs` by suffix. Other files match only
/// by exact name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Builder>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, file_name: impl Into<String>, build: F)
    where
        F: Fn() -> PluginExports + Send + Sync + 'static,
    {
        self.plugins.write().insert(file_name.into(), Arc::new(build));
    }

    /// Register a plugin whose factory always yields `exports`.
    pub fn register_exports(&self, file_name: impl Into<String>, exports: PluginExports) {
        self.register(file_name, move || exports.clone());
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.plugins.read().contains_key(file_name)
    }

    fn lookup(&self, file_name: &str) -> Option<Builder> {
        let plugins = self.plugins.read();
        if let Some(build) = plugins.get(file_name) {
            return Some(Arc::clone(build));
        }
        if !is_staged_name(file_name) {
            return None;
        }
        plugins
            .iter()
            .filter(|(name, _)| file_name.ends_with(&format!("_{name}")))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, build)| Arc::clone(build))
    }
}

/// Staging flattens `http://` and `https://` to these prefixes.
fn is_staged_name(file_name: &str) -> bool {
    file_name.starts_with("http___") || file_name.starts_with("https___")
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.plugins.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

#[async_trait]
impl CodeLoader for PluginRegistry {
    async fn load_code(&self, path: &Path) -> Result<PluginFactory, CodeLoadError> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(CodeLoadError::Missing);
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let build = self
            .lookup(&file_name)
            .ok_or_else(|| CodeLoadError::Unregistered(file_name.clone()))?;
        Ok(PluginFactory {
            source: path.to_path_buf(),
            build,
        })
    }
}

#[cfg(feature = "plugin")]
pub use dylib::DylibLoader;

#[cfg(feature = "plugin")]
mod dylib {
    use super::{CodeLoader, PluginExports, PluginFactory};
    use crate::errors::CodeLoadError;
    use async_trait::async_trait;
    use libloading::{Library, Symbol};
    use std::ffi::CStr;
    use std::os::raw::c_char;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Exported by plugin libraries; returns a NUL-terminated JSON manifest.
    const MANIFEST_SYMBOL: &[u8] = b"nako_plugin_manifest\0";

    type ManifestFn = unsafe extern "C" fn() -> *const c_char;

    /// Loads shared libraries exposing `nako_plugin_manifest`.
    #[derive(Debug, Default)]
    pub struct DylibLoader;

    impl DylibLoader {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl CodeLoader for DylibLoader {
        async fn load_code(&self, path: &Path) -> Result<PluginFactory, CodeLoadError> {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || open(path))
                .await
                .map_err(|err| CodeLoadError::Library(err.to_string()))?
        }
    }

    fn open(path: PathBuf) -> Result<PluginFactory, CodeLoadError> {
        // SAFETY: loading runs the library's initialisers; plugins are trusted host code.
        let library = unsafe { Library::new(&path) }
            .map_err(|err| CodeLoadError::Library(err.to_string()))?;
        let manifest = unsafe {
            let entry: Symbol<ManifestFn> = library
                .get(MANIFEST_SYMBOL)
                .map_err(|err| CodeLoadError::Library(err.to_string()))?;
            let raw = entry();
            if raw.is_null() {
                return Err(CodeLoadError::Manifest("null manifest pointer".into()));
            }
            CStr::from_ptr(raw).to_string_lossy().into_owned()
        };
        let exports: PluginExports = serde_json::from_str(&manifest)
            .map_err(|err| CodeLoadError::Manifest(err.to_string()))?;
        let library = Arc::new(library);
        Ok(PluginFactory::new(path, move || {
            let _loaded = &library;
            exports.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn registry_loads_registered_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plugin_math.mjs");
        std::fs::write(&file, "export default {}").unwrap();

        let registry = PluginRegistry::new();
        registry.register_exports("plugin_math.mjs", PluginExports::new("math", &["sin", "cos"]));
        let factory = registry.load_code(&file).await.unwrap();
        assert_eq!(factory.source(), file.as_path());
        assert_eq!(factory.instantiate().functions, vec!["sin", "cos"]);
    }

    #[tokio::test]
    async fn staged_copy_matches_by_suffix() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("https___example.com_plugin_math.mjs");
        std::fs::write(&file, "").unwrap();

        let registry = PluginRegistry::new();
        registry.register_exports("plugin_math.mjs", PluginExports::new("math", &[]));
        let factory = registry.load_code(&file).await.unwrap();
        assert_eq!(factory.instantiate().name, "math");
    }

    #[tokio::test]
    async fn local_file_with_similar_name_is_not_matched() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("my_plugin_math.mjs");
        std::fs::write(&file, "").unwrap();

        let registry = PluginRegistry::new();
        registry.register_exports("plugin_math.mjs", PluginExports::new("math", &[]));
        let result = registry.load_code(&file).await;
        assert!(matches!(result, Err(CodeLoadError::Unregistered(name)) if name == "my_plugin_math.mjs"));
    }

    #[tokio::test]
    async fn unregistered_or_missing_files_fail() {
        let dir = tempdir().unwrap();
        let registry = PluginRegistry::new();
        let missing = registry.load_code(&dir.path().join("nope.mjs")).await;
        assert!(matches!(missing, Err(CodeLoadError::Io(_))));

        let file = dir.path().join("plugin_x.mjs");
        std::fs::write(&file, "").unwrap();
        let unregistered = registry.load_code(&file).await;
        assert!(matches!(unregistered, Err(CodeLoadError::Unregistered(name)) if name == "plugin_x.mjs"));
    }
}
