//=====================================================
// File: lib.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: nako_loader library root
// Objective: Expose plugin resolution, asynchronous dependency loading and
//            the engine contract used by the nadesiko runtime host
//=====================================================

pub mod config;
pub mod engine;
pub mod errors;
pub mod importer;
pub mod loader;
pub mod logging;
pub mod reference;
pub mod resolver;

pub use config::LoaderConfig;
pub use engine::{ExecMode, ImportScanner, ScriptEngine, Session, SessionError};
pub use errors::{ImportError, ImportErrorKind};
pub use importer::Importer;
pub use loader::native::{CodeLoader, PluginExports, PluginFactory, PluginRegistry};
pub use loader::{AsyncLoader, DependencySet, LoaderTask};
pub use reference::{Location, ModuleKind, ModuleReference, ResolutionCandidate};
pub use resolver::{PathResolver, Resolution};
