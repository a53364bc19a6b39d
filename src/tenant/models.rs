//! Tenant data models
//!
//! This module defines the per-tenant declaration records read from the
//! tenant YAML files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tabled::Tabled;

/// A single tenant prefix declaration
///
/// Field names follow the YAML keys used in the tenant files. Unknown keys
/// are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantDeclaration {
    /// Name of the prefix. Used for every resource name and mount path.
    #[serde(rename = "Name")]
    pub name: String,

    /// GCP projects from which the service accounts may call Vault
    #[serde(rename = "GcpProjects", default)]
    pub gcp_projects: Vec<String>,

    /// Service accounts that will be able to read the secrets
    #[serde(rename = "ServiceAccounts", default)]
    pub service_accounts: Vec<String>,

    /// GitHub teams in "Organization/TeamName" format, granted write access
    #[serde(rename = "GithubTeamNames", default)]
    pub github_team_names: Vec<String>,

    /// Dynamic secret rolesets, available to every reader of the prefix
    #[serde(rename = "RolesetBindings", default)]
    pub roleset_bindings: Vec<RolesetBinding>,

    /// Enables the interactive IAM login role
    #[serde(rename = "EnableIAMLogin", default)]
    pub enable_iam_login: bool,

    /// AppRoles granted read access to the prefix
    #[serde(rename = "AppRoles", default)]
    pub app_roles: Vec<String>,

    /// Custom template used to render the write policy
    #[serde(rename = "PolicyTemplatePath", default)]
    pub policy_template_path: Option<PathBuf>,

    /// Custom template used to render the read policy
    #[serde(rename = "ReadPolicyTemplatePath", default)]
    pub read_policy_template_path: Option<PathBuf>,
}

impl TenantDeclaration {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            gcp_projects: Vec::new(),
            service_accounts: Vec::new(),
            github_team_names: Vec::new(),
            roleset_bindings: Vec::new(),
            enable_iam_login: false,
            app_roles: Vec::new(),
            policy_template_path: None,
            read_policy_template_path: None,
        }
    }

    pub fn has_rolesets(&self) -> bool {
        !self.roleset_bindings.is_empty()
    }
}

/// A named roleset with its resource-to-role bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolesetBinding {
    #[serde(rename = "RolesetName")]
    pub roleset_name: String,

    #[serde(rename = "RolesetBindings", default)]
    pub bindings: Vec<ResourceBinding>,
}

/// IAM roles granted on one cloud resource
///
/// Passed through unmodified to the roleset resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBinding {
    #[serde(rename = "Resource")]
    pub resource: String,

    #[serde(rename = "Roles", default)]
    pub roles: Vec<String>,
}

impl ResourceBinding {
    /// Provider-side representation of the binding
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "resource": self.resource,
            "roles": self.roles,
        })
    }
}

/// Per-tenant summary of what was provisioned
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct TenantSummary {
    #[tabled(rename = "Tenant")]
    pub name: String,
    #[tabled(rename = "Write Policy")]
    pub write_policy: String,
    #[tabled(rename = "Read Policy")]
    pub read_policy: String,
    #[tabled(rename = "GCP Auth Roles")]
    pub gcp_auth_roles: usize,
    #[tabled(rename = "Rolesets")]
    pub rolesets: usize,
    #[tabled(rename = "GitHub Teams")]
    pub github_teams: usize,
    #[tabled(rename = "AppRoles")]
    pub app_roles: usize,
}
