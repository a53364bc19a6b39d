//! Tenant provisioning
//!
//! Translates one tenant declaration into its own resource subtree, grouped
//! under a `TenantPrefix` component: write and read policies, GCP auth
//! roles, the KV mount, the GCP dynamic secret backend and its rolesets. GitHub team and AppRole bindings are handed to
//! the [`AuthAggregate`] instead of being registered directly.

use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, info};

use super::models::{RolesetBinding, TenantDeclaration, TenantSummary};
use crate::auth::aggregator::{AuthAggregate, PolicyRef};
use crate::engine::graph::ResourceGraph;
use crate::engine::models::{Resource, ResourceRef, ResourceType};
use crate::error::{ProvisionError, Result};
use crate::policy::{PolicyRenderer, DEFAULT_READ_POLICY_TEMPLATE, DEFAULT_WRITE_POLICY_TEMPLATE};
use crate::utils::sanitizer::validate_role_name;

/// TTL of tokens issued through the GCP auth roles (1h)
pub const GCP_AUTH_TOKEN_TTL_SECONDS: u64 = 60 * 60;
/// Default lease of GCP dynamic secrets (15m)
pub const GCP_SECRETS_DEFAULT_LEASE_SECONDS: u64 = 15 * 60;
/// Maximum lease of GCP dynamic secrets (3h)
pub const GCP_SECRETS_MAX_LEASE_SECONDS: u64 = 3 * 60 * 60;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Settings shared by every tenant
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// GCP project the rolesets are created in
    pub gcp_project: Option<String>,
    pub write_policy_template: PathBuf,
    pub read_policy_template: PathBuf,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            gcp_project: None,
            write_policy_template: PathBuf::from(DEFAULT_WRITE_POLICY_TEMPLATE),
            read_policy_template: PathBuf::from(DEFAULT_READ_POLICY_TEMPLATE),
        }
    }
}

/// GCP auth role flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GcpLogin {
    /// Interactive IAM login, opt-in per tenant
    Iam,
    /// Workload identity of GCE instances and GKE pods
    Gce,
}

impl GcpLogin {
    fn as_str(&self) -> &'static str {
        match self {
            GcpLogin::Iam => "iam",
            GcpLogin::Gce => "gce",
        }
    }
}

/// Roleset secret flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RolesetFlavour {
    AccessToken,
    ServiceAccountKey,
}

impl RolesetFlavour {
    fn name_segment(&self) -> &'static str {
        match self {
            RolesetFlavour::AccessToken => "token",
            RolesetFlavour::ServiceAccountKey => "key",
        }
    }

    fn secret_type(&self) -> &'static str {
        match self {
            RolesetFlavour::AccessToken => "access_token",
            RolesetFlavour::ServiceAccountKey => "service_account_key",
        }
    }
}

/// Provisions tenant resource subtrees
pub struct TenantProvisioner {
    settings: ProvisionSettings,
    renderer: PolicyRenderer,
}

impl TenantProvisioner {
    pub fn new(settings: ProvisionSettings) -> Self {
        Self {
            settings,
            renderer: PolicyRenderer::new(),
        }
    }

    /// Register every resource of one tenant and forward its auth bindings
    pub fn provision<G: ResourceGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        auth: &mut AuthAggregate,
        tenant: &TenantDeclaration,
    ) -> Result<TenantSummary> {
        info!("Provisioning tenant '{}'", tenant.name);

        // Templates see the resolved template paths, defaults included
        let mut resolved = tenant.clone();
        let write_template = resolved
            .policy_template_path
            .get_or_insert_with(|| self.settings.write_policy_template.clone())
            .clone();
        let read_template = resolved
            .read_policy_template_path
            .get_or_insert_with(|| self.settings.read_policy_template.clone())
            .clone();

        let write_name = format!("{}-policy-write", tenant.name);
        debug!("Rendering {} from {}", write_name, write_template.display());
        let write_document = self.renderer.render(&write_template, &resolved)?;

        let read_name = format!("{}-policy-read", tenant.name);
        debug!("Rendering {} from {}", read_name, read_template.display());
        let read_document = self.renderer.render(&read_template, &resolved)?;

        let component = graph.register(Resource::new(
            tenant_component_name(&tenant.name),
            ResourceType::TenantPrefix,
        ))?;

        let write_policy = policy(graph, &component, write_name, write_document)?;
        let read_policy = policy(graph, &component, read_name, read_document)?;

        let mut gcp_auth_roles = 0;
        if !tenant.service_accounts.is_empty() {
            if tenant.enable_iam_login {
                gcp_auth_role(graph, &component, tenant, &read_policy, GcpLogin::Iam)?;
                gcp_auth_roles += 1;
            }
            gcp_auth_role(graph, &component, tenant, &read_policy, GcpLogin::Gce)?;
            gcp_auth_roles += 1;
        }

        for team in &tenant.github_team_names {
            auth.record_team_policy(team, &write_policy)?;
        }
        for app_role in &tenant.app_roles {
            validate_role_name(app_role)?;
            auth.record_app_role_policy(app_role, &read_policy)?;
        }

        graph.register(
            Resource::new(format!("{}-kv-engine", tenant.name), ResourceType::Mount)
                .property("path", format!("{}/data", tenant.name))
                .property("description", format!("Key Value engine for {}.", tenant.name))
                .property("type", "kv")
                .parent(&component),
        )?;

        let gcp_backend = graph.register(
            Resource::new(
                format!("{}-gcp-dynamic-secrets", tenant.name),
                ResourceType::GcpSecretBackend,
            )
            .property("path", format!("{}/gcp", tenant.name))
            .property("defaultLeaseTtlSeconds", GCP_SECRETS_DEFAULT_LEASE_SECONDS)
            .property("maxLeaseTtlSeconds", GCP_SECRETS_MAX_LEASE_SECONDS)
            .parent(&component),
        )?;

        if tenant.has_rolesets() {
            let project = self.settings.gcp_project.clone().ok_or_else(|| {
                ProvisionError::config(format!(
                    "Missing required configuration key 'project': tenant '{}' declares RolesetBindings",
                    tenant.name
                ))
            })?;

            for roleset in &tenant.roleset_bindings {
                validate_role_name(&roleset.roleset_name)?;
                for flavour in [RolesetFlavour::AccessToken, RolesetFlavour::ServiceAccountKey] {
                    roleset_resource(graph, tenant, &gcp_backend, roleset, &project, flavour)?;
                }
            }
        }

        Ok(TenantSummary {
            name: tenant.name.clone(),
            write_policy: write_policy.name().to_string(),
            read_policy: read_policy.name().to_string(),
            gcp_auth_roles,
            rolesets: tenant.roleset_bindings.len() * 2,
            github_teams: tenant.github_team_names.len(),
            app_roles: tenant.app_roles.len(),
        })
    }
}

/// Logical name of a tenant's component resource
///
/// Tenant names cannot contain `/`, so this never clashes with the names
/// of the resources grouped under it.
pub fn tenant_component_name(tenant: &str) -> String {
    format!("tenant/{tenant}")
}

fn policy<G: ResourceGraph + ?Sized>(
    graph: &mut G,
    component: &ResourceRef,
    name: String,
    document: String,
) -> Result<PolicyRef> {
    let resource = graph.register(
        Resource::new(name.clone(), ResourceType::Policy)
            .property("name", name.as_str())
            .property("policy", document)
            .parent(component),
    )?;
    Ok(PolicyRef::new(name, resource))
}

fn gcp_auth_role<G: ResourceGraph + ?Sized>(
    graph: &mut G,
    component: &ResourceRef,
    tenant: &TenantDeclaration,
    read_policy: &PolicyRef,
    login: GcpLogin,
) -> Result<ResourceRef> {
    let role_name = format!("{}-{}", tenant.name, login.as_str());

    graph.register(
        Resource::new(role_name.clone(), ResourceType::GcpAuthBackendRole)
            .property("role", role_name)
            .property("type", login.as_str())
            .property("boundProjects", tenant.gcp_projects.clone())
            .property("boundServiceAccounts", tenant.service_accounts.clone())
            .property("tokenPolicies", json!([read_policy.name()]))
            .property("tokenTtl", GCP_AUTH_TOKEN_TTL_SECONDS)
            .delete_before_replace()
            .parent(component),
    )
}

fn roleset_resource<G: ResourceGraph + ?Sized>(
    graph: &mut G,
    tenant: &TenantDeclaration,
    backend: &ResourceRef,
    roleset: &RolesetBinding,
    project: &str,
    flavour: RolesetFlavour,
) -> Result<ResourceRef> {
    let name = format!(
        "{}-gcp-{}-{}",
        tenant.name,
        flavour.name_segment(),
        roleset.roleset_name
    );
    let bindings: Vec<Value> = roleset.bindings.iter().map(|b| b.to_value()).collect();

    let mut resource = Resource::new(name.clone(), ResourceType::GcpSecretRoleset)
        .property("roleset", name)
        .property("backend", backend.id())
        .property("bindings", bindings)
        .property("secretType", flavour.secret_type())
        .property("project", project);

    if flavour == RolesetFlavour::AccessToken {
        resource = resource.property("tokenScopes", json!([CLOUD_PLATFORM_SCOPE]));
    }

    graph.register(resource.parent(backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{MockResourceGraph, ProgramBuilder};
    use crate::tenant::models::ResourceBinding;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        settings: ProvisionSettings,
    }

    fn fixture(project: Option<&str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let write = dir.path().join("write.hcl.gotmpl");
        let read = dir.path().join("read.hcl.gotmpl");
        fs::write(&write, "path \"{{ .Tenant.Name }}/data/*\" { capabilities = [\"create\"] }").unwrap();
        fs::write(&read, "path \"{{ .Tenant.Name }}/data/*\" { capabilities = [\"read\"] }").unwrap();

        Fixture {
            settings: ProvisionSettings {
                gcp_project: project.map(str::to_string),
                write_policy_template: write,
                read_policy_template: read,
            },
            _dir: dir,
        }
    }

    fn roleset(name: &str) -> RolesetBinding {
        RolesetBinding {
            roleset_name: name.to_string(),
            bindings: vec![ResourceBinding {
                resource: "buckets/example-bucket".to_string(),
                roles: vec![
                    "roles/storage.objectAdmin".to_string(),
                    "roles/storage.admin".to_string(),
                ],
            }],
        }
    }

    #[test]
    fn test_minimal_tenant() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let summary = provisioner
            .provision(&mut builder, &mut auth, &TenantDeclaration::new("payments"))
            .unwrap();
        let program = builder.finish();

        let names: Vec<&str> = program.resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tenant/payments",
                "payments-policy-write",
                "payments-policy-read",
                "payments-kv-engine",
                "payments-gcp-dynamic-secrets",
            ]
        );
        assert_eq!(summary.gcp_auth_roles, 0);
        assert!(auth.is_empty());

        let write = program.resource("payments-policy-write").unwrap();
        assert_eq!(
            write.get("policy"),
            Some(&json!("path \"payments/data/*\" { capabilities = [\"create\"] }"))
        );
        let mount = program.resource("payments-kv-engine").unwrap();
        assert_eq!(mount.get("path"), Some(&json!("payments/data")));
        assert_eq!(mount.get("description"), Some(&json!("Key Value engine for payments.")));

        for name in [
            "payments-policy-write",
            "payments-policy-read",
            "payments-kv-engine",
            "payments-gcp-dynamic-secrets",
        ] {
            assert_eq!(
                program.resource(name).unwrap().parent_name(),
                Some("tenant/payments"),
                "{} should be grouped under the tenant component",
                name
            );
        }
        assert_eq!(
            program.resource("tenant/payments").unwrap().resource_type,
            ResourceType::TenantPrefix
        );
    }

    #[test]
    fn test_no_service_accounts_means_no_gcp_auth_roles() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.gcp_projects = vec!["payments-prod".to_string()];
        tenant.enable_iam_login = true;

        provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();
        let program = builder.finish();
        assert_eq!(program.resources_of_type(ResourceType::GcpAuthBackendRole).count(), 0);
    }

    #[test]
    fn test_gcp_auth_roles() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.gcp_projects = vec!["payments-prod".to_string()];
        tenant.service_accounts = vec!["api@payments-prod.iam.gserviceaccount.com".to_string()];

        let mut builder = ProgramBuilder::new("vault");
        provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();
        let program = builder.finish();
        assert!(program.resource("payments-iam").is_none());
        let gce = program.resource("payments-gce").unwrap();
        assert_eq!(gce.get("type"), Some(&json!("gce")));
        assert_eq!(gce.get("tokenPolicies"), Some(&json!(["payments-policy-read"])));
        assert_eq!(gce.get("tokenTtl"), Some(&json!(3600)));
        assert_eq!(gce.get("boundProjects"), Some(&json!(["payments-prod"])));
        assert_eq!(gce.options.delete_before_replace, Some(true));
        assert_eq!(gce.parent_name(), Some("tenant/payments"));

        tenant.enable_iam_login = true;
        let mut builder = ProgramBuilder::new("vault");
        let summary = provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();
        let program = builder.finish();
        assert_eq!(summary.gcp_auth_roles, 2);
        let iam = program.resource("payments-iam").unwrap();
        assert_eq!(iam.get("type"), Some(&json!("iam")));
    }

    #[test]
    fn test_auth_bindings_forwarded() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.github_team_names = vec!["acme/payments-devs".to_string()];
        tenant.app_roles = vec!["payments-ci".to_string()];

        provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();

        let team = auth.organization("acme").unwrap().team("payments-devs").unwrap();
        assert_eq!(team.policies[0].name(), "payments-policy-write");
        assert_eq!(auth.app_role("payments-ci").unwrap()[0].name(), "payments-policy-read");

        // Teams and AppRoles are only registered by the auth materializer
        let program = builder.finish();
        assert_eq!(program.resources_of_type(ResourceType::GithubTeam).count(), 0);
    }

    #[test]
    fn test_malformed_team_aborts() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.github_team_names = vec!["payments-devs".to_string()];

        let err = provisioner.provision(&mut builder, &mut auth, &tenant).unwrap_err();
        assert!(matches!(err, ProvisionError::MalformedIdentity { .. }));
    }

    #[test]
    fn test_one_roleset_yields_token_and_key() {
        let fx = fixture(Some("vault-host-project"));
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.roleset_bindings = vec![roleset("test")];

        let summary = provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();
        let program = builder.finish();

        assert_eq!(summary.rolesets, 2);
        let rolesets: Vec<_> = program.resources_of_type(ResourceType::GcpSecretRoleset).collect();
        assert_eq!(rolesets.len(), 2);

        let token = program.resource("payments-gcp-token-test").unwrap();
        let key = program.resource("payments-gcp-key-test").unwrap();
        assert_eq!(token.get("secretType"), Some(&json!("access_token")));
        assert_eq!(key.get("secretType"), Some(&json!("service_account_key")));
        assert_eq!(token.get("project"), key.get("project"));
        assert_eq!(token.get("project"), Some(&json!("vault-host-project")));
        assert_eq!(token.get("bindings"), key.get("bindings"));
        assert_eq!(
            token.get("tokenScopes"),
            Some(&json!(["https://www.googleapis.com/auth/cloud-platform"]))
        );
        assert!(key.get("tokenScopes").is_none());
        assert_eq!(token.get("backend"), Some(&json!("${payments-gcp-dynamic-secrets.id}")));
        assert_eq!(key.parent_name(), Some("payments-gcp-dynamic-secrets"));
    }

    #[test]
    fn test_rolesets_require_project() {
        let fx = fixture(None);
        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.roleset_bindings = vec![roleset("test")];

        let err = provisioner.provision(&mut builder, &mut auth, &tenant).unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigError(ref msg) if msg.contains("project")));
    }

    #[test]
    fn test_template_override() {
        let fx = fixture(None);
        let override_path = fx._dir.path().join("custom.hcl.gotmpl");
        fs::write(&override_path, "# custom {{ .Tenant.Name }}").unwrap();

        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let mut tenant = TenantDeclaration::new("payments");
        tenant.read_policy_template_path = Some(override_path);

        provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();
        let program = builder.finish();
        assert_eq!(
            program.resource("payments-policy-read").unwrap().get("policy"),
            Some(&json!("# custom payments"))
        );
    }

    #[test]
    fn test_templates_see_resolved_template_paths() {
        let fx = fixture(None);
        let write = fx.settings.write_policy_template.clone();
        let read = fx.settings.read_policy_template.clone();
        fs::write(
            &write,
            "{{ .Tenant.PolicyTemplatePath }}|{{ .Tenant.ReadPolicyTemplatePath }}",
        )
        .unwrap();

        let mut provisioner = TenantProvisioner::new(fx.settings.clone());
        let mut builder = ProgramBuilder::new("vault");
        let mut auth = AuthAggregate::new();

        let tenant = TenantDeclaration::new("payments");
        provisioner.provision(&mut builder, &mut auth, &tenant).unwrap();

        let program = builder.finish();
        assert_eq!(
            program.resource("payments-policy-write").unwrap().get("policy"),
            Some(&json!(format!("{}|{}", write.display(), read.display())))
        );
        assert!(tenant.policy_template_path.is_none());
    }

    #[test]
    fn test_missing_template_aborts_before_registration() {
        let mut provisioner = TenantProvisioner::new(ProvisionSettings {
            gcp_project: None,
            write_policy_template: PathBuf::from("/missing/write.hcl.gotmpl"),
            read_policy_template: PathBuf::from("/missing/read.hcl.gotmpl"),
        });
        let mut graph = MockResourceGraph::new();
        graph.expect_register().never();
        let mut auth = AuthAggregate::new();

        let err = provisioner
            .provision(&mut graph, &mut auth, &TenantDeclaration::new("payments"))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::TemplateRead { .. }));
    }
}
