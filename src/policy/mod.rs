//! Policy template module
//!
//! Loads policy templates from disk and renders them into Vault policy
//! documents for each tenant.

pub mod renderer;
pub mod template;

pub use renderer::PolicyRenderer;
pub use template::Template;

/// Default template for the tenant write policy
pub const DEFAULT_WRITE_POLICY_TEMPLATE: &str = "policies/tenant_write.hcl.gotmpl";

/// Default template for the tenant read policy
pub const DEFAULT_READ_POLICY_TEMPLATE: &str = "policies/tenant_read.hcl.gotmpl";
