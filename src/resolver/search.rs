//=====================================================
// File: resolver/search.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Ordered search for native plugin files
// Objective: Let the syntactic form of a name pick its search category and,
//            for bare names, walk the fixed list of roots until one verifies
//=====================================================

use super::descriptor::PackageDescriptorReader;
use super::paths::{NameForm, absolutize, parent_dir, strip_file_scheme};
use super::probe::ProbeSession;
use crate::config::LoaderConfig;
use crate::reference::Location;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reserved naming convention for plugins bundled with the runtime.
static SYSTEM_PLUGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^plugin_[a-z0-9_]+\.mjs").expect("system plugin pattern"));

pub fn is_system_plugin(name: &str) -> bool {
    SYSTEM_PLUGIN.is_match(name)
}

/// One location to verify, with the label it is logged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStep {
    pub label: &'static str,
    pub path: PathBuf,
}

impl SearchStep {
    fn new(label: &'static str, path: PathBuf) -> Self {
        Self { label, path }
    }
}

#[derive(Debug, Clone)]
pub struct SearchStrategyChain {
    config: Arc<LoaderConfig>,
    reader: PackageDescriptorReader,
}

impl SearchStrategyChain {
    pub fn new(config: Arc<LoaderConfig>) -> Self {
        let reader = PackageDescriptorReader::new(config.native_extensions.clone());
        Self { config, reader }
    }

    /// Locate `name`, recording every probe in `session`.
    ///
    /// Absolute and relative names are verified once and never fall back
    /// to the bare-name roots.
    pub fn search(
        &self,
        name: &str,
        origin: Option<&Path>,
        session: &mut ProbeSession,
    ) -> Option<Location> {
        match NameForm::of(name) {
            NameForm::Url => Some(Location::Remote(name.to_string())),
            NameForm::Absolute => {
                let path = absolutize(&strip_file_scheme(name), &self.config.working_dir);
                self.verify(session, &SearchStep::new("absolute path", path))
            }
            NameForm::Relative => {
                let path = absolutize(Path::new(name), &self.origin_dir(origin));
                self.verify(session, &SearchStep::new("relative path", path))
            }
            NameForm::Bare => self
                .plan(name, origin)
                .iter()
                .find_map(|step| self.verify(session, step)),
        }
    }

    /// The ordered roots tried for a bare name.
    pub fn plan(&self, name: &str, origin: Option<&Path>) -> Vec<SearchStep> {
        let config = &self.config;
        let install = absolutize(&config.install_root, &config.working_dir);
        let mut steps = vec![SearchStep::new("origin directory", self.origin_dir(origin).join(name))];

        if is_system_plugin(name) {
            steps.push(SearchStep::new(
                "runtime src",
                absolutize(&config.runtime_src_dir(), &config.working_dir).join(name),
            ));
            steps.push(SearchStep::new(
                "engine src",
                absolutize(&config.engine_src_dir(), &config.working_dir).join(name),
            ));
        }

        if let Some(lib) = &config.lib_root {
            steps.push(SearchStep::new(
                "NAKO_LIB",
                absolutize(lib, &config.working_dir).join(name),
            ));
        }

        steps.push(SearchStep::new(
            "runtime node_modules",
            install.join("node_modules").join(name),
        ));
        steps.push(SearchStep::new(
            "runtime sibling",
            absolutize(&install.join(".."), &config.working_dir).join(name),
        ));
        steps.push(SearchStep::new(
            "engine package",
            absolutize(&config.engine_package_src_dir(), &config.working_dir).join(name),
        ));

        if let Some(home) = &config.home_root {
            let home = absolutize(home, &config.working_dir);
            steps.push(SearchStep::new(
                "NAKO_HOME",
                home.join("node_modules").join(name),
            ));
            steps.push(SearchStep::new("NAKO_HOME/src", home.join("src").join(name)));
        }

        for global in &config.global_module_paths {
            steps.push(SearchStep::new(
                "NODE_PATH",
                absolutize(global, &config.working_dir).join(name),
            ));
        }
        steps
    }

    fn origin_dir(&self, origin: Option<&Path>) -> PathBuf {
        match origin {
            Some(file) => parent_dir(file, &self.config.working_dir),
            None => absolutize(&self.config.working_dir, Path::new("/")),
        }
    }

    fn verify(&self, session: &mut ProbeSession, step: &SearchStep) -> Option<Location> {
        match self.reader.verify(session, &step.path, step.label) {
            Ok(found) => found.map(Location::Local),
            Err(err) => {
                tracing::warn!(label = step.label, error = %err, "ignoring candidate");
                None
            }
        }
    }
}
