//=====================================================
// File: resolver/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Import path resolution for native plugins and script libraries
// Objective: Classify each import name, locate it, and return one candidate
//            or a failure that lists every location that was searched
//=====================================================

pub mod descriptor;
pub mod paths;
pub mod probe;
pub mod search;

use crate::config::LoaderConfig;
use crate::errors::{ImportError, ImportErrorKind};
use crate::reference::{Location, ModuleKind, ModuleReference, ResolutionCandidate, is_url};
use paths::{absolutize, has_extension, parent_dir};
use probe::{ProbeLog, ProbeSession};
use search::SearchStrategyChain;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a successful resolution: the candidate plus the probes made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub candidate: ResolutionCandidate,
    pub trace: ProbeLog,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    config: Arc<LoaderConfig>,
    chain: SearchStrategyChain,
}

impl PathResolver {
    pub fn new(config: Arc<LoaderConfig>) -> Self {
        let chain = SearchStrategyChain::new(Arc::clone(&config));
        Self { config, chain }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn chain(&self) -> &SearchStrategyChain {
        &self.chain
    }

    /// Decide whether `name` refers to a native module or a script library.
    pub fn classify(&self, name: &str) -> ModuleKind {
        if has_extension(name, &self.config.native_extensions, true) {
            ModuleKind::NativeModule
        } else if has_extension(name, &self.config.script_extensions, true) {
            ModuleKind::ScriptLibrary
        } else {
            ModuleKind::NativeModule
        }
    }

    /// Resolve one import. Each call starts with an empty probe cache and trace.
    pub fn resolve(&self, reference: &ModuleReference) -> Result<Resolution, ImportError> {
        let name = reference.name.as_str();
        let fail = |kind| ImportError::new(kind, reference.origin(), reference.origin_line);

        match self.classify(name) {
            ModuleKind::ScriptLibrary => {
                let location = self
                    .script_location(name, reference.origin())
                    .ok_or_else(|| {
                        fail(ImportErrorKind::MissingOrigin {
                            name: name.to_string(),
                        })
                    })?;
                tracing::debug!(name, %location, "resolved script library");
                Ok(Resolution {
                    candidate: ResolutionCandidate::script(location),
                    trace: ProbeLog::default(),
                })
            }
            ModuleKind::NativeModule => {
                let mut session = ProbeSession::new();
                let found = self.chain.search(name, reference.origin(), &mut session);
                let trace = session.into_log();
                match found {
                    Some(location) => {
                        tracing::debug!(name, %location, probes = trace.len(), "resolved native module");
                        Ok(Resolution {
                            candidate: ResolutionCandidate::native(location),
                            trace,
                        })
                    }
                    None => Err(fail(ImportErrorKind::Resolution {
                        name: name.to_string(),
                        trace,
                    })),
                }
            }
        }
    }

    /// Resolve every reference, stopping at the first failure.
    pub fn resolve_all(
        &self,
        references: &[ModuleReference],
    ) -> Result<Vec<(ModuleReference, Resolution)>, ImportError> {
        references
            .iter()
            .map(|reference| Ok((reference.clone(), self.resolve(reference)?)))
            .collect()
    }

    /// Script libraries are never probed here; missing files surface when loading.
    fn script_location(&self, name: &str, origin: Option<&Path>) -> Option<Location> {
        if is_url(name) {
            return Some(Location::Remote(name.to_string()));
        }
        let path = Path::new(name);
        if path.is_absolute() {
            return Some(Location::Local(absolutize(path, &self.config.working_dir)));
        }
        let origin = origin?;
        let dir = parent_dir(origin, &self.config.working_dir);
        Some(Location::Local(absolutize(path, &dir)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolver() -> PathResolver {
        PathResolver::new(Arc::new(
            LoaderConfig::new("/opt/nako").with_working_dir("/work"),
        ))
    }

    #[test]
    fn classification_by_suffix() {
        let r = resolver();
        assert_eq!(r.classify("plugin_math.mjs"), ModuleKind::NativeModule);
        assert_eq!(r.classify("helper.js.txt"), ModuleKind::NativeModule);
        assert_eq!(r.classify("lib.nako3"), ModuleKind::ScriptLibrary);
        assert_eq!(r.classify("lib.nako.txt"), ModuleKind::ScriptLibrary);
        assert_eq!(r.classify("left-pad"), ModuleKind::NativeModule);
        assert_eq!(r.classify("data.csv"), ModuleKind::NativeModule);
    }

    #[test]
    fn remote_script_is_not_probed() {
        let reference = ModuleReference::new("https://example.com/lib.nako3", None, 1);
        let resolution = resolver().resolve(&reference).unwrap();
        assert_eq!(
            resolution.candidate,
            ResolutionCandidate::script(Location::Remote("https://example.com/lib.nako3".into()))
        );
        assert!(resolution.trace.is_empty());
    }

    #[test]
    fn relative_script_resolves_beside_origin() {
        let reference =
            ModuleReference::new("../shared/util.nako3", Some(Path::new("/proj/app/main.nako3")), 2);
        let resolution = resolver().resolve(&reference).unwrap();
        assert_eq!(
            resolution.candidate.location,
            Location::Local(PathBuf::from("/proj/shared/util.nako3"))
        );
    }

    #[test]
    fn absolute_script_resolves_to_itself() {
        let reference = ModuleReference::new("/lib/./util.nako3", None, 4);
        let resolution = resolver().resolve(&reference).unwrap();
        assert_eq!(
            resolution.candidate.location,
            Location::Local(PathBuf::from("/lib/util.nako3"))
        );
    }

    #[test]
    fn relative_script_without_origin_fails() {
        let reference = ModuleReference::new("util.nako3", None, 7);
        let err = resolver().resolve(&reference).unwrap_err();
        assert!(matches!(err.kind, ImportErrorKind::MissingOrigin { .. }));
        assert_eq!(err.line, 7);
    }
}
