//! Name validation for Vault mount paths and resource names
//!
//! Tenant names end up in mount paths (`<name>/data`, `<name>/gcp`) and in
//! every logical resource name, so they are restricted to a conservative
//! character set.

use crate::error::{ProvisionError, Result};
use regex::Regex;

const MAX_TENANT_NAME_LENGTH: usize = 64;
const TENANT_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$";
const ROLE_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$";

/// Validate a tenant prefix name
pub fn validate_tenant_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProvisionError::invalid_tenant_name(name, "name is empty"));
    }

    if name.len() > MAX_TENANT_NAME_LENGTH {
        return Err(ProvisionError::invalid_tenant_name(
            name,
            format!("name is longer than {MAX_TENANT_NAME_LENGTH} characters"),
        ));
    }

    let re = Regex::new(TENANT_NAME_PATTERN)?;
    if !re.is_match(name) {
        return Err(ProvisionError::invalid_tenant_name(
            name,
            "only letters, digits, '-' and '_' are allowed, starting with a letter or digit",
        ));
    }

    Ok(())
}

/// Validate an AppRole or roleset name
pub fn validate_role_name(name: &str) -> Result<()> {
    let re = Regex::new(ROLE_NAME_PATTERN)?;
    if !re.is_match(name) {
        return Err(ProvisionError::invalid_argument(format!(
            "Invalid role name '{name}': only letters, digits, '.', '-' and '_' are allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tenant_names() {
        let valid_names = vec!["payments", "team-a", "team_b", "a", "1st-tenant", "Billing"];

        for name in valid_names {
            assert!(validate_tenant_name(name).is_ok(), "Name '{}' should be valid", name);
        }
    }

    #[test]
    fn test_invalid_tenant_names() {
        let long_name = "a".repeat(65);
        let invalid_names = vec![
            "",
            "-leading",
            "_leading",
            "with space",
            "with/slash",
            "with.dot",
            "tenant@acme",
            long_name.as_str(),
        ];

        for name in invalid_names {
            assert!(validate_tenant_name(name).is_err(), "Name '{}' should be invalid", name);
        }
    }

    #[test]
    fn test_invalid_tenant_name_error() {
        let err = validate_tenant_name("bad/name").unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidTenantName { name, .. } if name == "bad/name"));
    }

    #[test]
    fn test_role_names() {
        assert!(validate_role_name("payments-ci").is_ok());
        assert!(validate_role_name("deploy.bot_1").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("ci/bot").is_err());
        assert!(validate_role_name("-ci").is_err());
    }
}
