//! Stack provisioning facade
//!
//! This module runs the whole pipeline for one invocation: server-wide
//! configuration, every tenant file in directory order, and finally the
//! consolidated auth backends.

use serde::Serialize;
use tracing::info;

use super::server::configure_server;
use crate::auth::aggregator::{AuthAggregate, AuthBindingRow};
use crate::auth::materializer::{materialize, AuthSummary};
use crate::config::Config;
use crate::engine::graph::{ProgramBuilder, ResourceGraph};
use crate::engine::models::Program;
use crate::error::Result;
use crate::tenant::loader::TenantLoader;
use crate::tenant::models::TenantSummary;
use crate::tenant::provisioner::TenantProvisioner;

/// What a pipeline run registered
#[derive(Debug, Clone, Serialize)]
pub struct StackReport {
    pub files: usize,
    pub tenants: Vec<TenantSummary>,
    pub auth: AuthSummary,
    pub bindings: Vec<AuthBindingRow>,
}

/// A finished program together with its report
#[derive(Debug, Clone)]
pub struct StackPlan {
    pub program: Program,
    pub report: StackReport,
}

/// High-level stack manager
pub struct StackManager {
    config: Config,
}

impl StackManager {
    /// Create a manager from validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline into a fresh program document
    pub fn plan(&self) -> Result<StackPlan> {
        let mut builder = ProgramBuilder::new(self.config.program_name.as_str());
        let report = self.build(&mut builder)?;
        Ok(StackPlan {
            program: builder.finish(),
            report,
        })
    }

    /// Run the pipeline against any resource graph
    pub fn build<G: ResourceGraph + ?Sized>(&self, graph: &mut G) -> Result<StackReport> {
        configure_server(graph)?;

        let mut loader = TenantLoader::new(self.config.tenant_dir()?);
        let mut provisioner = TenantProvisioner::new(self.config.provision_settings());
        let mut aggregate = AuthAggregate::new();
        let mut tenants = Vec::new();

        let files = loader.files()?;
        info!(
            "Reading {} tenant file(s) from {}",
            files.len(),
            loader.dir().display()
        );

        for file in &files {
            for tenant in loader.load_file(file)? {
                tenants.push(provisioner.provision(graph, &mut aggregate, &tenant)?);
            }
        }

        let auth = materialize(&aggregate, graph, &self.config.auth_settings())?;

        info!("Provisioned {} tenant(s)", tenants.len());

        Ok(StackReport {
            files: files.len(),
            tenants,
            auth,
            bindings: aggregate.binding_rows(),
        })
    }
}
