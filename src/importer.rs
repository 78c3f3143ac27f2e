//=====================================================
// File: importer.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Single entry point from import names to loaded dependencies
// Objective: Resolve every reference of a program, then load the whole
//            batch concurrently; nothing partial escapes on failure
//=====================================================

use crate::config::LoaderConfig;
use crate::engine::ImportScanner;
use crate::errors::{ImportError, ImportErrorKind};
use crate::loader::native::CodeLoader;
use crate::loader::{AsyncLoader, DependencySet};
use crate::reference::ModuleReference;
use crate::resolver::PathResolver;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub struct Importer {
    resolver: PathResolver,
    loader: AsyncLoader,
}

impl Importer {
    pub fn new(config: LoaderConfig, code_loader: Arc<dyn CodeLoader>) -> Self {
        let loader = AsyncLoader::new(&config, code_loader);
        Self::from_parts(PathResolver::new(Arc::new(config)), loader)
    }

    pub fn from_parts(resolver: PathResolver, loader: AsyncLoader) -> Self {
        Self { resolver, loader }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &AsyncLoader {
        &self.loader
    }

    /// Resolve all references (stopping at the first unresolvable one),
    /// then load them as one batch.
    pub async fn load_dependencies(
        &self,
        references: &[ModuleReference],
    ) -> Result<DependencySet, ImportError> {
        let resolved = self
            .resolver
            .resolve_all(references)?
            .into_iter()
            .map(|(reference, resolution)| (reference, resolution.candidate))
            .collect();
        self.loader.load_batch(resolved).await
    }

    /// Scan `code` for import statements and load what they name.
    pub async fn load_source(
        &self,
        code: &str,
        filename: Option<&Path>,
        scanner: &ImportScanner,
    ) -> Result<DependencySet, ImportError> {
        let references = scanner.scan(code, filename);
        tracing::debug!(imports = references.len(), "scanned source");
        self.load_dependencies(&references).await
    }

    /// Blocking form of [`Importer::load_dependencies`] for synchronous
    /// callers. Returns as soon as the batch settles; downloads still in
    /// flight after a failure are left to finish on detached threads.
    pub fn load_dependencies_blocking(
        &self,
        references: &[ModuleReference],
    ) -> Result<DependencySet, ImportError> {
        block_on_detached(self.load_dependencies(references), None)?
    }
}

/// Drive `future` on a fresh current-thread runtime. The runtime is shut
/// down without waiting for blocking-pool jobs, so a fail-fast result is
/// not held back by the slowest fetch.
pub(crate) fn block_on_detached<F: Future>(
    future: F,
    origin: Option<&Path>,
) -> Result<F::Output, ImportError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            ImportError::new(
                ImportErrorKind::Aborted(format!("tokio runtime init failed: {err}")),
                origin,
                0,
            )
        })?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
