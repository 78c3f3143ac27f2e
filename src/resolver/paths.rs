//=====================================================
// File: resolver/paths.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Syntactic path classification and lexical normalisation
// Objective: Decide which search category owns a name without touching disk
//=====================================================

use crate::reference::is_url;
use std::path::{Component, Path, PathBuf};

/// Syntactic category of a native-module name. The first category that
/// matches owns the name; later categories are never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameForm {
    Url,
    Absolute,
    Relative,
    Bare,
}

impl NameForm {
    pub fn of(name: &str) -> Self {
        if is_url(name) {
            NameForm::Url
        } else if is_absolute_name(name) {
            NameForm::Absolute
        } else if name.starts_with('.') || name.contains('/') || name.contains('\\') {
            NameForm::Relative
        } else {
            NameForm::Bare
        }
    }
}

/// Root marker, drive marker (`C:\`) or `file:/` scheme.
pub fn is_absolute_name(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with("file:/") {
        return true;
    }
    name.get(1..3)
        .map(|marker| marker.eq_ignore_ascii_case(":\\"))
        .unwrap_or(false)
}

/// Turn a `file:` URL into a filesystem path; other names pass through.
pub fn strip_file_scheme(name: &str) -> PathBuf {
    if let Some(rest) = name.strip_prefix("file://") {
        return PathBuf::from(rest);
    }
    if let Some(rest) = name.strip_prefix("file:") {
        return PathBuf::from(rest);
    }
    PathBuf::from(name)
}

/// Resolve `.` and `..` segments without consulting the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, normalised form of `path`, anchored at `base` when relative.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Absolute directory containing `file`.
pub fn parent_dir(file: &Path, base: &Path) -> PathBuf {
    let absolute = absolutize(file, base);
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute)
}

/// True when the final extension (ignoring a trailing `.txt` when
/// `allow_txt` is set) is one of `extensions`.
pub fn has_extension(name: &str, extensions: &[String], allow_txt: bool) -> bool {
    let trimmed = if allow_txt {
        name.strip_suffix(".txt").unwrap_or(name)
    } else {
        name
    };
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', '\\']) => {
            extensions.iter().any(|known| known == ext)
        }
        _ => false,
    }
}
