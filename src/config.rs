//=====================================================
// File: config.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Explicit configuration for plugin search roots and loader behaviour
// Objective: Load settings from TOML, overlay environment roots once, and
//            hand the result to the resolver and loader at construction
//=====================================================

//! Loader configuration.
//!
//! Nothing in the resolver reads the process environment directly. The
//! installation root, the `NAKO_LIB` / `NAKO_HOME` / `NODE_PATH` roots and
//! the staging directory are all captured here, so tests can build a fully
//! isolated configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Primary library root searched for bare plugin names.
pub const LIB_ROOT_VAR: &str = "NAKO_LIB";
/// Secondary home root; searched under `node_modules` and `src`.
pub const HOME_ROOT_VAR: &str = "NAKO_HOME";
/// Global module path list.
pub const GLOBAL_PATH_VAR: &str = "NODE_PATH";

const CONFIG_DIR: &str = "nako";
const CONFIG_FILE: &str = "loader.toml";
const STAGING_DIR: &str = "com.nadesi.v3.cnako";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Runtime installation root (the directory holding `src/` and `core/`).
    pub install_root: PathBuf,
    /// Base for relative importing files and for imports without an origin.
    pub working_dir: PathBuf,
    pub lib_root: Option<PathBuf>,
    pub home_root: Option<PathBuf>,
    pub global_module_paths: Vec<PathBuf>,
    /// Package directory name of the language engine under `node_modules`.
    pub engine_package: String,
    /// Where remotely hosted native modules are written before loading.
    pub staging_dir: PathBuf,
    pub native_extensions: Vec<String>,
    pub script_extensions: Vec<String>,
    /// Per-request timeout for remote fetches. `None` waits indefinitely.
    pub fetch_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from("."),
            working_dir: PathBuf::from("."),
            lib_root: None,
            home_root: None,
            global_module_paths: Vec::new(),
            engine_package: "nadesiko3core".to_string(),
            staging_dir: env::temp_dir().join(STAGING_DIR),
            native_extensions: ["mjs", "js", "so", "dylib", "dll"]
                .into_iter()
                .map(String::from)
                .collect(),
            script_extensions: ["nako3", "nako"].into_iter().map(String::from).collect(),
            fetch_timeout_secs: Some(30),
            user_agent: format!("nako-loader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl LoaderConfig {
    /// Configuration rooted at `install_root` with nothing else set.
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            ..Self::default()
        }
    }

    /// Default configuration for `install_root`, overlaid with the
    /// process environment and the current directory.
    pub fn from_env(install_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::new(install_root);
        config.working_dir = env::current_dir().map_err(ConfigError::WorkingDir)?;
        config.apply_env(|key| env::var_os(key));
        Ok(config)
    }

    /// Load a TOML file (when it exists), then overlay the environment.
    pub fn load(path: &Path, install_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str::<Self>(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };
        if config.install_root == Path::new(".") {
            config.install_root = install_root.into();
        }
        if config.working_dir == Path::new(".") {
            config.working_dir = env::current_dir().map_err(ConfigError::WorkingDir)?;
        }
        config.apply_env(|key| env::var_os(key));
        Ok(config)
    }

    /// `<config dir>/nako/loader.toml`, when a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Fill unset roots from `lookup`. Values already present win.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if self.lib_root.is_none() {
            self.lib_root = non_empty(lookup(LIB_ROOT_VAR)).map(PathBuf::from);
        }
        if self.home_root.is_none() {
            self.home_root = non_empty(lookup(HOME_ROOT_VAR)).map(PathBuf::from);
        }
        if self.global_module_paths.is_empty() {
            if let Some(list) = non_empty(lookup(GLOBAL_PATH_VAR)) {
                self.global_module_paths = env::split_paths(&list)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect();
            }
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_lib_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lib_root = Some(dir.into());
        self
    }

    pub fn with_home_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_root = Some(dir.into());
        self
    }

    pub fn with_global_module_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.global_module_paths.push(dir.into());
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// `<install>/src`, the runtime's bundled plugin directory.
    pub fn runtime_src_dir(&self) -> PathBuf {
        self.install_root.join("src")
    }

    /// `<install>/core/src`, the engine's bundled plugin directory.
    pub fn engine_src_dir(&self) -> PathBuf {
        self.install_root.join("core").join("src")
    }

    pub fn node_modules_dir(&self) -> PathBuf {
        self.install_root.join("node_modules")
    }

    /// `<install>/node_modules/<engine package>/src`.
    pub fn engine_package_src_dir(&self) -> PathBuf {
        self.node_modules_dir().join(&self.engine_package).join("src")
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}
