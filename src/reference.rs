//=====================================================
// File: reference.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Shared data model for imports and resolved candidates
// Objective: Describe what a program asked for and where it was found
//=====================================================

use std::fmt;
use std::path::{Path, PathBuf};

/// A name taken from one import statement, with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub name: String,
    pub origin_file: Option<PathBuf>,
    pub origin_line: u32,
}

impl ModuleReference {
    pub fn new(name: impl Into<String>, origin_file: Option<&Path>, origin_line: u32) -> Self {
        Self {
            name: name.into(),
            origin_file: origin_file.map(Path::to_path_buf),
            origin_line,
        }
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin_file.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Host code loaded through a [`crate::loader::native::CodeLoader`].
    NativeModule,
    /// Source text compiled together with the importing program.
    ScriptLibrary,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::NativeModule => f.write_str("native"),
            ModuleKind::ScriptLibrary => f.write_str("script"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Local(PathBuf),
    Remote(String),
}

impl Location {
    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Location::Local(path) => Some(path),
            Location::Remote(_) => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionCandidate {
    pub location: Location,
    pub kind: ModuleKind,
}

impl ResolutionCandidate {
    pub fn native(location: Location) -> Self {
        Self {
            location,
            kind: ModuleKind::NativeModule,
        }
    }

    pub fn script(location: Location) -> Self {
        Self {
            location,
            kind: ModuleKind::ScriptLibrary,
        }
    }
}

/// Returns true for `http://` and `https://` references.
pub fn is_url(name: &str) -> bool {
    name.starts_with("http://") || name.starts_with("https://")
}
