//! Tenant policy rendering
//!
//! Renders policy templates against a tenant declaration. The template
//! context exposes the declaration under `.Tenant`, using the same field
//! names as the tenant YAML files.

use serde_json::json;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::template::Template;
use crate::error::Result;
use crate::tenant::models::TenantDeclaration;

/// Renders policy documents, caching parsed templates by path
#[derive(Debug, Default)]
pub struct PolicyRenderer {
    templates: HashMap<PathBuf, Template>,
}

impl PolicyRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the template at `path` for a tenant
    pub fn render(&mut self, path: &Path, tenant: &TenantDeclaration) -> Result<String> {
        let context = json!({ "Tenant": serde_json::to_value(tenant)? });
        self.template(path)?.render(&context)
    }

    fn template(&mut self, path: &Path) -> Result<&Template> {
        let template = match self.templates.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Loading policy template {}", path.display());
                entry.insert(Template::load(path)?)
            }
        };
        Ok(template)
    }
}
