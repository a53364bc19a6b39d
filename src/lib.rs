//! vault-tenants - Multi-tenant Vault configuration generator
//!
//! Reads per-tenant YAML declarations and produces a declarative program
//! describing Vault policies, auth backends, secret engines and dynamic
//! GCP secret rolesets for every tenant.

pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod tenant;
pub mod utils;
pub mod vault;

// Re-export commonly used types
pub use error::{ProvisionError, Result};
