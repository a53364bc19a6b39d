//! Authentication binding aggregation
//!
//! Tenants are declared independently, but GitHub organizations, teams and
//! AppRoles are shared across tenants. The aggregate collects every
//! (organization, team) → policy and approle → policy binding so each
//! backend, team and role is registered exactly once with the union of its
//! policies.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

use crate::engine::models::ResourceRef;
use crate::error::{ProvisionError, Result};

/// A registered Vault policy, referenced by name
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRef {
    name: String,
    resource: ResourceRef,
}

impl PolicyRef {
    pub fn new<S: Into<String>>(name: S, resource: ResourceRef) -> Self {
        Self {
            name: name.into(),
            resource,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Policy name as an engine reference, so bindings depend on the policy resource
    pub fn to_value(&self) -> Value {
        self.resource.output("name")
    }
}

/// A parsed `organization/team` identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityBinding {
    pub organization: String,
    pub team: String,
}

impl FromStr for IdentityBinding {
    type Err = ProvisionError;

    fn from_str(value: &str) -> Result<Self> {
        let segments: Vec<&str> = value.split('/').collect();
        if segments.len() != 2 {
            return Err(ProvisionError::malformed_identity(
                value,
                format!(
                    "expected exactly one '/' separating organization and team, found {} segment(s)",
                    segments.len()
                ),
            ));
        }

        let (organization, team) = (segments[0], segments[1]);
        if organization.is_empty() || team.is_empty() {
            return Err(ProvisionError::malformed_identity(
                value,
                "organization and team must both be non-empty",
            ));
        }
        if organization.chars().any(char::is_whitespace) || team.chars().any(char::is_whitespace) {
            return Err(ProvisionError::malformed_identity(
                value,
                "organization and team must not contain whitespace",
            ));
        }

        Ok(Self {
            organization: organization.to_string(),
            team: team.to_string(),
        })
    }
}

impl fmt::Display for IdentityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.team)
    }
}

/// GitHub team and the policies granted to it
#[derive(Debug, Clone, PartialEq)]
pub struct GithubTeam {
    pub name: String,
    pub policies: Vec<PolicyRef>,
}

/// GitHub organization and its teams
#[derive(Debug, Clone, PartialEq)]
pub struct GithubOrg {
    pub name: String,
    teams: BTreeMap<String, GithubTeam>,
}

impl GithubOrg {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            teams: BTreeMap::new(),
        }
    }

    pub fn teams(&self) -> impl Iterator<Item = &GithubTeam> {
        self.teams.values()
    }

    pub fn team(&self, name: &str) -> Option<&GithubTeam> {
        self.teams.get(name)
    }
}

/// Consolidated authentication bindings across all tenants
///
/// Keys are unique and iterate in lexicographic order; policy lists keep
/// insertion order and are never deduplicated by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthAggregate {
    github_orgs: BTreeMap<String, GithubOrg>,
    app_roles: BTreeMap<String, Vec<PolicyRef>>,
}

impl AuthAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `policy` to the GitHub team named by `org_slash_team`
    pub fn record_team_policy(&mut self, org_slash_team: &str, policy: &PolicyRef) -> Result<()> {
        let identity: IdentityBinding = org_slash_team.parse()?;

        let org = self
            .github_orgs
            .entry(identity.organization.clone())
            .or_insert_with(|| GithubOrg::new(&identity.organization));

        let team = org
            .teams
            .entry(identity.team.clone())
            .or_insert_with(|| GithubTeam {
                name: identity.team.clone(),
                policies: Vec::new(),
            });

        team.policies.push(policy.clone());
        Ok(())
    }

    /// Grant `policy` to the AppRole `role_name`
    pub fn record_app_role_policy(&mut self, role_name: &str, policy: &PolicyRef) -> Result<()> {
        if role_name.is_empty() {
            return Err(ProvisionError::invalid_argument("AppRole name must not be empty"));
        }

        self.app_roles
            .entry(role_name.to_string())
            .or_default()
            .push(policy.clone());
        Ok(())
    }

    pub fn organizations(&self) -> impl Iterator<Item = &GithubOrg> {
        self.github_orgs.values()
    }

    pub fn organization(&self, name: &str) -> Option<&GithubOrg> {
        self.github_orgs.get(name)
    }

    pub fn app_roles(&self) -> impl Iterator<Item = (&str, &[PolicyRef])> {
        self.app_roles
            .iter()
            .map(|(name, policies)| (name.as_str(), policies.as_slice()))
    }

    pub fn app_role(&self, name: &str) -> Option<&[PolicyRef]> {
        self.app_roles.get(name).map(Vec::as_slice)
    }

    pub fn team_count(&self) -> usize {
        self.github_orgs.values().map(|org| org.teams.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.github_orgs.is_empty() && self.app_roles.is_empty()
    }

    /// Flatten the aggregate into display rows
    pub fn binding_rows(&self) -> Vec<AuthBindingRow> {
        let teams = self.organizations().flat_map(|org| {
            org.teams().map(move |team| AuthBindingRow {
                kind: "github".to_string(),
                identity: format!("{}/{}", org.name, team.name),
                policies: join_policy_names(&team.policies),
            })
        });

        let roles = self.app_roles().map(|(name, policies)| AuthBindingRow {
            kind: "approle".to_string(),
            identity: name.to_string(),
            policies: join_policy_names(policies),
        });

        teams.chain(roles).collect()
    }
}

fn join_policy_names(policies: &[PolicyRef]) -> String {
    policies
        .iter()
        .map(PolicyRef::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One aggregated binding, for table output
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct AuthBindingRow {
    #[tabled(rename = "Method")]
    pub kind: String,
    #[tabled(rename = "Identity")]
    pub identity: String,
    #[tabled(rename = "Policies")]
    pub policies: String,
}
