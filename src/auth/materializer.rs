//! Authentication backend materialization
//!
//! Walks the [`AuthAggregate`] once, after every tenant has been processed,
//! and registers one resource per distinct organization, team and AppRole.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use super::aggregator::{AuthAggregate, PolicyRef};
use crate::engine::graph::ResourceGraph;
use crate::engine::models::{Resource, ResourceRef, ResourceType};
use crate::error::Result;

/// Token period for AppRole tokens (8h)
pub const APPROLE_TOKEN_PERIOD_SECONDS: u64 = 8 * 60 * 60;

const GITHUB_DEFAULT_LEASE_TTL: &str = "8h";
const GITHUB_MAX_LEASE_TTL: &str = "24h";
const GITHUB_TOKEN_TYPE: &str = "default-service";
const GITHUB_LISTING_VISIBILITY: &str = "unauth";

/// Logical name of the component grouping the auth backends
pub const AUTHENTICATION_COMPONENT: &str = "vault-authentication";

/// Settings for the auth backends
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    /// GitHub API base URL, for GitHub Enterprise installations
    pub github_base_url: Option<String>,
    /// Response-wrapping TTL for generated AppRole secret IDs
    pub secret_id_wrapping_ttl: Option<String>,
}

/// Counts of what was materialized
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthSummary {
    pub organizations: usize,
    pub teams: usize,
    pub app_roles: usize,
}

/// Registers auth backends, team bindings and AppRoles with the resource graph
pub struct AuthMaterializer<'a, G: ResourceGraph + ?Sized> {
    graph: &'a mut G,
    settings: &'a AuthSettings,
    component: Option<ResourceRef>,
    github_backends: HashMap<String, ResourceRef>,
}

impl<'a, G: ResourceGraph + ?Sized> AuthMaterializer<'a, G> {
    pub fn new(graph: &'a mut G, settings: &'a AuthSettings) -> Self {
        Self {
            graph,
            settings,
            component: None,
            github_backends: HashMap::new(),
        }
    }

    /// Register every backend and binding in the aggregate
    pub fn materialize(&mut self, aggregate: &AuthAggregate) -> Result<AuthSummary> {
        let mut summary = AuthSummary::default();

        let component = self.component()?;
        self.graph.register(
            Resource::new("auth-gcp", ResourceType::GcpAuthBackend)
                .property("path", "gcp")
                .parent(&component),
        )?;

        for org in aggregate.organizations() {
            let backend = self.github_backend(&org.name)?;
            summary.organizations += 1;

            for team in org.teams() {
                debug!(
                    "Binding GitHub team {}/{} to {} policies",
                    org.name,
                    team.name,
                    team.policies.len()
                );
                self.graph.register(
                    Resource::new(team_resource_name(&org.name, &team.name), ResourceType::GithubTeam)
                        .property("backend", backend.output("path"))
                        .property("team", team.name.as_str())
                        .property("policies", policy_values(&team.policies))
                        .parent(&backend),
                )?;
                summary.teams += 1;
            }
        }

        let approle = self.graph.register(
            Resource::new("approle", ResourceType::AuthBackend).property("type", "approle"),
        )?;

        for (role_name, policies) in aggregate.app_roles() {
            self.app_role(&approle, role_name, policies)?;
            summary.app_roles += 1;
        }

        info!(
            "Materialized auth: {} GitHub organizations, {} teams, {} AppRoles",
            summary.organizations, summary.teams, summary.app_roles
        );

        Ok(summary)
    }

    /// Component grouping the GCP and GitHub auth backends, registered on first use
    pub fn component(&mut self) -> Result<ResourceRef> {
        if let Some(component) = &self.component {
            return Ok(component.clone());
        }

        let component = self.graph.register(Resource::new(
            AUTHENTICATION_COMPONENT,
            ResourceType::Authentication,
        ))?;
        self.component = Some(component.clone());
        Ok(component)
    }

    /// GitHub auth backend for an organization, registered on first use
    pub fn github_backend(&mut self, organization: &str) -> Result<ResourceRef> {
        if let Some(backend) = self.github_backends.get(organization) {
            return Ok(backend.clone());
        }

        let component = self.component()?;
        let backend = self.graph.register(
            Resource::new(
                format!("{organization}-auth-github"),
                ResourceType::GithubAuthBackend,
            )
            .property("path", organization)
            .property("organization", organization)
            .optional_property("baseUrl", self.settings.github_base_url.clone())
            .property(
                "tune",
                json!({
                    "defaultLeaseTtl": GITHUB_DEFAULT_LEASE_TTL,
                    "maxLeaseTtl": GITHUB_MAX_LEASE_TTL,
                    "tokenType": GITHUB_TOKEN_TYPE,
                    "listingVisibility": GITHUB_LISTING_VISIBILITY,
                }),
            )
            .parent(&component),
        )?;

        self.graph.export(
            &format!("github_{organization}_accessor"),
            backend.output("accessor"),
        )?;

        self.github_backends
            .insert(organization.to_string(), backend.clone());
        Ok(backend)
    }

    fn app_role(
        &mut self,
        approle: &ResourceRef,
        role_name: &str,
        policies: &[PolicyRef],
    ) -> Result<()> {
        debug!("Defining AppRole {} with {} policies", role_name, policies.len());

        let role = self.graph.register(
            Resource::new(
                format!("{role_name}-appRoleBackend"),
                ResourceType::AppRoleAuthBackendRole,
            )
            .property("backend", approle.output("path"))
            .property("tokenPeriod", APPROLE_TOKEN_PERIOD_SECONDS)
            .property("tokenPolicies", policy_values(policies))
            .property("roleName", role_name)
            .parent(approle),
        )?;

        let secret_id = self.graph.register(
            Resource::new(
                format!("{role_name}-appRoleSecret"),
                ResourceType::AppRoleAuthBackendRoleSecretId,
            )
            .property("backend", approle.output("path"))
            .property("roleName", role.output("roleName"))
            .optional_property("wrappingTtl", self.settings.secret_id_wrapping_ttl.clone())
            .parent(&role),
        )?;

        self.graph.export(
            &format!("AppRole-{role_name}-SecretWrappingTokens"),
            secret_id.output("wrappingToken"),
        )?;
        self.graph
            .export(&format!("AppRole-{role_name}-RoleId"), role.output("roleId"))?;

        Ok(())
    }
}

/// Logical name of a team binding
///
/// Neither segment can contain `/`, so distinct teams never share a name.
pub fn team_resource_name(organization: &str, team: &str) -> String {
    format!("{organization}/{team}/github-team")
}

fn policy_values(policies: &[PolicyRef]) -> Value {
    Value::Array(policies.iter().map(PolicyRef::to_value).collect())
}

/// Materialize an aggregate into the given resource graph
pub fn materialize<G: ResourceGraph + ?Sized>(
    aggregate: &AuthAggregate,
    graph: &mut G,
    settings: &AuthSettings,
) -> Result<AuthSummary> {
    AuthMaterializer::new(graph, settings).materialize(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{MockResourceGraph, ProgramBuilder};
    use crate::error::ProvisionError;

    fn policy(name: &str) -> PolicyRef {
        PolicyRef::new(name, ResourceRef::new(name, ResourceType::Policy))
    }

    #[test]
    fn test_two_orgs_one_team_each() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_team_policy("acme/ops", &policy("a-policy-write")).unwrap();
        aggregate.record_team_policy("globex/dev", &policy("b-policy-write")).unwrap();

        let mut builder = ProgramBuilder::new("vault");
        let summary = materialize(&aggregate, &mut builder, &AuthSettings::default()).unwrap();
        let program = builder.finish();

        assert_eq!(summary.organizations, 2);
        assert_eq!(summary.teams, 2);
        assert_eq!(program.resources_of_type(ResourceType::GithubAuthBackend).count(), 2);
        assert_eq!(program.resources_of_type(ResourceType::GithubTeam).count(), 2);
        assert!(program.output("github_acme_accessor").is_some());
        assert!(program.output("github_globex_accessor").is_some());
    }

    #[test]
    fn test_hyphenated_orgs_and_teams_stay_distinct() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_team_policy("acme-ops/x", &policy("p")).unwrap();
        aggregate.record_team_policy("acme/ops-x", &policy("p")).unwrap();

        let mut builder = ProgramBuilder::new("vault");
        let summary = materialize(&aggregate, &mut builder, &AuthSettings::default()).unwrap();
        let program = builder.finish();

        assert_eq!(summary.teams, 2);
        assert_eq!(
            program.resource("acme-ops/x/github-team").unwrap().parent_name(),
            Some("acme-ops-auth-github")
        );
        assert_eq!(
            program.resource("acme/ops-x/github-team").unwrap().parent_name(),
            Some("acme-auth-github")
        );
    }

    #[test]
    fn test_github_backend_is_idempotent() {
        let mut builder = ProgramBuilder::new("vault");
        let settings = AuthSettings::default();
        let mut materializer = AuthMaterializer::new(&mut builder, &settings);

        let first = materializer.github_backend("acme").unwrap();
        let second = materializer.github_backend("acme").unwrap();
        assert_eq!(first, second);

        let program = builder.finish();
        assert_eq!(program.resources_of_type(ResourceType::GithubAuthBackend).count(), 1);
        assert_eq!(program.outputs().len(), 1);
    }

    #[test]
    fn test_team_policies_in_insertion_order() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_team_policy("acme/ops", &policy("zeta-policy-write")).unwrap();
        aggregate.record_team_policy("acme/ops", &policy("alpha-policy-write")).unwrap();
        aggregate.record_team_policy("acme/ops", &policy("zeta-policy-write")).unwrap();

        let mut builder = ProgramBuilder::new("vault");
        materialize(&aggregate, &mut builder, &AuthSettings::default()).unwrap();
        let program = builder.finish();

        let team = program.resource("acme/ops/github-team").unwrap();
        assert_eq!(
            team.get("policies"),
            Some(&json!([
                "${zeta-policy-write.name}",
                "${alpha-policy-write.name}",
                "${zeta-policy-write.name}"
            ]))
        );
        assert_eq!(team.get("backend"), Some(&json!("${acme-auth-github.path}")));
        assert_eq!(team.parent_name(), Some("acme-auth-github"));
    }

    #[test]
    fn test_app_role_resources_and_outputs() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_app_role_policy("svc", &policy("p1")).unwrap();
        aggregate.record_app_role_policy("svc", &policy("p2")).unwrap();

        let settings = AuthSettings {
            github_base_url: None,
            secret_id_wrapping_ttl: Some("24h".to_string()),
        };
        let mut builder = ProgramBuilder::new("vault");
        let summary = materialize(&aggregate, &mut builder, &settings).unwrap();
        let program = builder.finish();

        assert_eq!(summary.app_roles, 1);
        let role = program.resource("svc-appRoleBackend").unwrap();
        assert_eq!(role.get("tokenPeriod"), Some(&json!(28800)));
        assert_eq!(role.get("roleName"), Some(&json!("svc")));
        assert_eq!(
            role.get("tokenPolicies"),
            Some(&json!(["${p1.name}", "${p2.name}"]))
        );

        let secret = program.resource("svc-appRoleSecret").unwrap();
        assert_eq!(secret.get("roleName"), Some(&json!("${svc-appRoleBackend.roleName}")));
        assert_eq!(secret.get("wrappingTtl"), Some(&json!("24h")));
        assert_eq!(secret.parent_name(), Some("svc-appRoleBackend"));

        assert_eq!(
            program.output("AppRole-svc-RoleId"),
            Some(&json!("${svc-appRoleBackend.roleId}"))
        );
        assert_eq!(
            program.output("AppRole-svc-SecretWrappingTokens"),
            Some(&json!("${svc-appRoleSecret.wrappingToken}"))
        );
    }

    #[test]
    fn test_github_base_url_and_tune() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_team_policy("acme/ops", &policy("p")).unwrap();

        let settings = AuthSettings {
            github_base_url: Some("https://github.example.com/api/v3/".to_string()),
            secret_id_wrapping_ttl: None,
        };
        let mut builder = ProgramBuilder::new("vault");
        materialize(&aggregate, &mut builder, &settings).unwrap();
        let program = builder.finish();

        let backend = program.resource("acme-auth-github").unwrap();
        assert_eq!(backend.get("path"), Some(&json!("acme")));
        assert_eq!(
            backend.get("baseUrl"),
            Some(&json!("https://github.example.com/api/v3/"))
        );
        assert_eq!(backend.get("tune").unwrap()["maxLeaseTtl"], json!("24h"));
        assert_eq!(backend.parent_name(), Some(AUTHENTICATION_COMPONENT));
    }

    #[test]
    fn test_empty_aggregate_registers_shared_backends() {
        let mut builder = ProgramBuilder::new("vault");
        let summary =
            materialize(&AuthAggregate::new(), &mut builder, &AuthSettings::default()).unwrap();
        let program = builder.finish();

        assert_eq!(summary, AuthSummary::default());
        assert!(program.resource(AUTHENTICATION_COMPONENT).is_some());
        assert_eq!(
            program.resource("auth-gcp").unwrap().parent_name(),
            Some(AUTHENTICATION_COMPONENT)
        );
        assert!(program.resource("approle").is_some());
        assert!(program.outputs().is_empty());
    }

    #[test]
    fn test_engine_error_aborts() {
        let mut aggregate = AuthAggregate::new();
        aggregate.record_team_policy("acme/ops", &policy("p")).unwrap();

        let mut graph = MockResourceGraph::new();
        graph
            .expect_register()
            .times(1)
            .returning(|_| Err(ProvisionError::config("engine unavailable")));
        graph.expect_export().never();

        let result = materialize(&aggregate, &mut graph, &AuthSettings::default());
        assert!(matches!(result, Err(ProvisionError::ConfigError(_))));
    }
}
