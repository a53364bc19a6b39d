//! Provisioning engine seam
//!
//! Every resource the tool declares goes through [`ResourceGraph`]. The
//! shipped implementation, [`ProgramBuilder`], records registrations into a
//! [`Program`] document that the engine applies later.

use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use super::models::{Program, Resource, ResourceRef};
use crate::error::{ProvisionError, Result};

/// Trait for registering resources with the provisioning engine
#[cfg_attr(test, mockall::automock)]
pub trait ResourceGraph {
    /// Register a resource and return a handle to it
    fn register(&mut self, resource: Resource) -> Result<ResourceRef>;

    /// Export a named stack output
    fn export(&mut self, key: &str, value: Value) -> Result<()>;
}

/// Resource graph that builds a declarative program document
pub struct ProgramBuilder {
    program: Program,
    names: HashSet<String>,
    output_keys: HashSet<String>,
}

impl ProgramBuilder {
    pub fn new<S: Into<String>>(program_name: S) -> Self {
        Self {
            program: Program::new(program_name),
            names: HashSet::new(),
            output_keys: HashSet::new(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

impl ResourceGraph for ProgramBuilder {
    fn register(&mut self, resource: Resource) -> Result<ResourceRef> {
        if self.names.contains(&resource.name) {
            return Err(ProvisionError::duplicate_resource(&resource.name));
        }

        if let Some(parent) = resource.parent_name() {
            if !self.names.contains(parent) {
                return Err(ProvisionError::unknown_resource(parent));
            }
        }

        debug!(
            "Registering {} '{}' ({} properties)",
            resource.resource_type,
            resource.name,
            resource.properties.len()
        );

        let handle = resource.to_ref();
        self.names.insert(resource.name.clone());
        self.program.push_resource(resource);
        Ok(handle)
    }

    fn export(&mut self, key: &str, value: Value) -> Result<()> {
        if !self.output_keys.insert(key.to_string()) {
            return Err(ProvisionError::DuplicateOutput {
                key: key.to_string(),
            });
        }

        debug!("Exporting output '{}'", key);
        self.program.push_output(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::ResourceType;
    use serde_json::json;

    #[test]
    fn test_register_returns_handle() {
        let mut builder = ProgramBuilder::new("vault");
        let handle = builder
            .register(Resource::new("approle", ResourceType::AuthBackend).property("type", "approle"))
            .unwrap();

        assert_eq!(handle.name(), "approle");
        assert_eq!(handle.resource_type(), ResourceType::AuthBackend);
        assert!(builder.program().resource("approle").is_some());
        assert_eq!(builder.program().resources().len(), 1);
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut builder = ProgramBuilder::new("vault");
        builder
            .register(Resource::new("audit", ResourceType::Audit))
            .unwrap();

        let err = builder
            .register(Resource::new("audit", ResourceType::Audit))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DuplicateResource { name } if name == "audit"));
        assert_eq!(builder.finish().resources().len(), 1);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut builder = ProgramBuilder::new("vault");
        let ghost = ResourceRef::new("ghost", ResourceType::GithubAuthBackend);

        let err = builder
            .register(Resource::new("team", ResourceType::GithubTeam).parent(&ghost))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownResource { name } if name == "ghost"));
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut builder = ProgramBuilder::new("vault");
        builder.export("github_acme_accessor", json!("x")).unwrap();
        assert!(builder.export("github_acme_accessor", json!("y")).is_err());

        let program = builder.finish();
        assert_eq!(program.output("github_acme_accessor"), Some(&json!("x")));
    }
}
