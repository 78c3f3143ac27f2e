//=====================================================
// File: main.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: nako-loader diagnostic CLI
// Objective: Show where an import resolves (with its probe trace) and load
//            every dependency of a program the way the runtime would
//=====================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use nako_loader::loader::Payload;
use nako_loader::{
    CodeLoader, ImportScanner, Importer, LoaderConfig, ModuleReference, PathResolver, logging,
};

#[derive(Parser, Debug)]
#[command(name = "nako-loader", about = "Plugin resolution and dependency loading diagnostics")]
pub struct Args {
    /// Runtime installation root (holds `src/`, `core/src/` and `node_modules/`).
    #[arg(long = "runtime-root", global = true)]
    pub runtime_root: Option<PathBuf>,

    /// Loader configuration file. Defaults to `<config dir>/nako/loader.toml`.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Print every probe as it happens.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve one import name and print the candidate with its probe trace.
    Resolve(ResolveArgs),
    /// Scan a program for imports, then resolve and load all of them.
    ///
    /// Native modules are opened as shared libraries, which needs a build
    /// with the `plugin` feature; without it every native import fails as
    /// unregistered and only script libraries load.
    Deps(DepsArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ResolveArgs {
    /// Name as written in the import statement.
    pub name: String,

    /// File containing the import statement.
    #[arg(long = "from")]
    pub from: Option<PathBuf>,

    /// Line of the import statement.
    #[arg(long = "line", default_value_t = 0)]
    pub line: u32,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DepsArgs {
    /// Program source file.
    pub program: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("nako-loader", args.verbose);
    let config = load_config(&args)?;

    match args.command {
        Command::Resolve(cmd) => resolve_entry(config, cmd),
        Command::Deps(cmd) => deps_entry(config, cmd),
    }
}

fn load_config(args: &Args) -> Result<LoaderConfig> {
    let install_root = match &args.runtime_root {
        Some(root) => root.clone(),
        None => default_runtime_root()?,
    };
    let config = match args.config.clone().or_else(LoaderConfig::default_path) {
        Some(path) => LoaderConfig::load(&path, install_root)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LoaderConfig::from_env(install_root)?,
    };
    Ok(config)
}

/// Directory above the one holding the executable, like an installed runtime.
fn default_runtime_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating executable")?;
    Ok(exe
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn resolve_entry(config: LoaderConfig, args: ResolveArgs) -> Result<()> {
    let resolver = PathResolver::new(Arc::new(config));
    let reference = ModuleReference::new(&args.name, args.from.as_deref(), args.line);
    let resolution = resolver.resolve(&reference)?;
    println!("{} ({})", resolution.candidate.location, resolution.candidate.kind);
    if !resolution.trace.is_empty() {
        println!("{}", resolution.trace);
    }
    Ok(())
}

fn deps_entry(config: LoaderConfig, args: DepsArgs) -> Result<()> {
    let code = fs::read_to_string(&args.program)
        .with_context(|| format!("reading {}", args.program.display()))?;
    let program = fs::canonicalize(&args.program).unwrap_or_else(|_| args.program.clone());
    let importer = Importer::new(config, code_loader());
    let references = ImportScanner::new().scan(&code, Some(&program));
    if references.is_empty() {
        println!("no imports");
        return Ok(());
    }

    let deps = importer.load_dependencies_blocking(&references)?;
    for dep in deps.iter() {
        let detail = match &dep.payload {
            Payload::Script(text) => format!("{} bytes", text.len()),
            Payload::Native(factory) => {
                let exports = factory.instantiate();
                format!("{} [{}]", exports.name, exports.functions.join(", "))
            }
        };
        println!(
            "{}:{} {} -> {} ({detail})",
            program.display(),
            dep.reference.origin_line,
            dep.reference.name,
            dep.candidate.location
        );
    }
    Ok(())
}

#[cfg(feature = "plugin")]
fn code_loader() -> Arc<dyn CodeLoader> {
    Arc::new(nako_loader::loader::native::DylibLoader::new())
}

#[cfg(not(feature = "plugin"))]
fn code_loader() -> Arc<dyn CodeLoader> {
    Arc::new(nako_loader::PluginRegistry::new())
}
