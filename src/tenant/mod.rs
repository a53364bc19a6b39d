//! Tenant module
//!
//! This module reads per-tenant YAML declarations and provisions each
//! tenant's policies, mounts, GCP auth roles and dynamic secret rolesets.

pub mod loader;
pub mod models;
pub mod provisioner;

pub use loader::*;
pub use models::*;
pub use provisioner::*;
