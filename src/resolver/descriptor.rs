//=====================================================
// File: resolver/descriptor.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Verify a candidate path, following package.json redirection
// Objective: Accept code files directly and redirect directories to the
//            entry file named by their package descriptor
//=====================================================

use super::paths::{has_extension, normalize};
use super::probe::ProbeSession;
use crate::errors::DescriptorError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "package.json";

#[derive(Debug, Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    main: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct PackageDescriptorReader {
    code_extensions: Vec<String>,
}

impl PackageDescriptorReader {
    pub fn new(code_extensions: Vec<String>) -> Self {
        Self { code_extensions }
    }

    /// Verify `candidate`, logging each probe under `label`.
    ///
    /// Returns `Ok(None)` when neither the file nor a descriptor exists.
    pub fn verify(
        &self,
        session: &mut ProbeSession,
        candidate: &Path,
        label: &str,
    ) -> Result<Option<PathBuf>, DescriptorError> {
        let name = candidate.to_string_lossy();
        if has_extension(&name, &self.code_extensions, false) && session.check(candidate, label) {
            return Ok(Some(candidate.to_path_buf()));
        }

        let descriptor = candidate.join(DESCRIPTOR_FILE);
        let descriptor_label = format!("{label}/{DESCRIPTOR_FILE}");
        if !session.check(&descriptor, &descriptor_label) {
            return Ok(None);
        }
        let main = read_main(&descriptor)?;
        Ok(Some(normalize(&candidate.join(main))))
    }
}

fn read_main(descriptor: &Path) -> Result<String, DescriptorError> {
    let text = fs::read_to_string(descriptor).map_err(|source| DescriptorError::Io {
        path: descriptor.to_path_buf(),
        source,
    })?;
    let parsed: PackageDescriptor =
        serde_json::from_str(&text).map_err(|source| DescriptorError::Parse {
            path: descriptor.to_path_buf(),
            source,
        })?;
    match parsed.main {
        Some(serde_json::Value::String(main)) if !main.is_empty() => Ok(main),
        _ => Err(DescriptorError::MissingMain {
            path: descriptor.to_path_buf(),
        }),
    }
}
