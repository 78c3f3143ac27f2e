//=====================================================
// File: engine.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Contract between the dependency loader and a script engine
// Objective: Find import statements in source text and run a program only
//            after every one of its dependencies has loaded
//=====================================================

use crate::errors::ImportError;
use crate::importer::{Importer, block_on_detached};
use crate::loader::DependencySet;
use crate::reference::ModuleReference;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

/// `!「name」を取り込む`, `!『name』を取込`, `!"name"を取り込む`.
static IMPORT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[!！]\s*[「『"]([^」』"\r\n]+)[」』"]\s*を?\s*取り?込"#).expect("import pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Run,
    Test,
    Compile,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecMode::Run => "run",
            ExecMode::Test => "test",
            ExecMode::Compile => "compile",
        };
        f.write_str(label)
    }
}

/// Finds import statements in source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportScanner;

impl ImportScanner {
    pub fn new() -> Self {
        Self
    }

    /// References in the order they appear. Lines are 1-based.
    pub fn scan(&self, code: &str, filename: Option<&Path>) -> Vec<ModuleReference> {
        code.lines()
            .enumerate()
            .flat_map(|(index, line)| {
                IMPORT_STATEMENT
                    .captures_iter(line)
                    .map(move |caps| (index, caps[1].trim().to_string()))
                    .collect::<Vec<_>>()
            })
            .filter(|(_, name)| !name.is_empty())
            .map(|(index, name)| ModuleReference::new(name, filename, index as u32 + 1))
            .collect()
    }
}

pub trait ScriptEngine {
    fn find_imports(&self, code: &str, filename: Option<&Path>) -> Vec<ModuleReference>;

    /// Run, test or compile `code`. Called once per program, and only when
    /// `deps` holds every dependency.
    fn execute(
        &mut self,
        mode: ExecMode,
        code: &str,
        filename: Option<&Path>,
        deps: &DependencySet,
    ) -> anyhow::Result<()>;
}

/// Why a session did not reach a successful engine run.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("{mode} failed: {cause:#}")]
    Engine { mode: ExecMode, cause: anyhow::Error },
}

/// Binds an engine to an importer for whole-program runs.
#[derive(Debug)]
pub struct Session<E> {
    engine: E,
    importer: Importer,
}

impl<E: ScriptEngine> Session<E> {
    pub fn new(engine: E, importer: Importer) -> Self {
        Self { engine, importer }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    /// Load all dependencies of `code`, then hand the program to the engine.
    /// On an import failure the engine is never called.
    pub async fn run_source(
        &mut self,
        mode: ExecMode,
        code: &str,
        filename: Option<&Path>,
    ) -> Result<DependencySet, SessionError> {
        let references = self.engine.find_imports(code, filename);
        let deps = self.importer.load_dependencies(&references).await?;
        tracing::info!(%mode, deps = deps.len(), "dependencies ready");
        self.engine
            .execute(mode, code, filename, &deps)
            .map_err(|cause| SessionError::Engine { mode, cause })?;
        Ok(deps)
    }

    /// Blocking form of [`Session::run_source`].
    pub fn run_source_blocking(
        &mut self,
        mode: ExecMode,
        code: &str,
        filename: Option<&Path>,
    ) -> Result<DependencySet, SessionError> {
        block_on_detached(self.run_source(mode, code, filename), filename)?
    }
}
