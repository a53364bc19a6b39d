//! Tenant declaration loading
//!
//! Reads every file in the tenant directory, in file-name order, as a YAML
//! sequence of tenant declarations.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::models::TenantDeclaration;
use crate::error::{ProvisionError, Result};
use crate::utils::sanitizer::validate_tenant_name;

/// Loads tenant declarations and enforces unique tenant names across files
#[derive(Debug)]
pub struct TenantLoader {
    dir: PathBuf,
    seen: HashMap<String, PathBuf>,
}

impl TenantLoader {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            seen: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Declaration files in the tenant directory, sorted by file name
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ProvisionError::config(format!(
                "Cannot read tenant directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                debug!("Skipping non-file entry {}", entry.path().display());
                continue;
            }
            files.push(entry.path());
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Read and validate every declaration in one file
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<TenantDeclaration>> {
        let contents = fs::read_to_string(path)?;
        let declarations = parse_declarations(path, &contents)?;
        debug!(
            "Read {} tenant declaration(s) from {}",
            declarations.len(),
            path.display()
        );

        for declaration in &declarations {
            validate_tenant_name(&declaration.name)?;

            if let Some(first_file) = self.seen.get(&declaration.name) {
                return Err(ProvisionError::DuplicateTenant {
                    name: declaration.name.clone(),
                    file: path.to_path_buf(),
                    first_file: first_file.clone(),
                });
            }
            self.seen
                .insert(declaration.name.clone(), path.to_path_buf());
        }

        Ok(declarations)
    }
}

/// Strictly parse a YAML sequence of tenant declarations
///
/// A file holding no YAML document declares no tenants.
pub fn parse_declarations(path: &Path, contents: &str) -> Result<Vec<TenantDeclaration>> {
    let has_document = contents
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#') && line != "---");
    if !has_document {
        return Ok(Vec::new());
    }

    serde_yaml::from_str(contents).map_err(|source| ProvisionError::DeclarationParse {
        path: path.to_path_buf(),
        source,
    })
}
