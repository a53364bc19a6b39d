//! Configuration settings management
//!
//! This module handles loading configuration from multiple sources,
//! validation, and persistence.

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::auth::materializer::AuthSettings;
use crate::error::{ProvisionError, Result};
use crate::policy::{DEFAULT_READ_POLICY_TEMPLATE, DEFAULT_WRITE_POLICY_TEMPLATE};
use crate::tenant::provisioner::ProvisionSettings;

/// Prefix of environment variable overrides, e.g. `VAULT_TENANTS_CONFIG_PATH`
pub const ENV_PREFIX: &str = "VAULT_TENANTS";

/// Keys accepted by `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "config_path",
    "project",
    "program_name",
    "github_base_url",
    "write_policy_template",
    "read_policy_template",
    "secret_id_wrapping_ttl",
    "no_color",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the tenant declaration files
    pub config_path: Option<PathBuf>,
    /// GCP project used by dynamic secret rolesets
    pub project: Option<String>,
    /// Name of the generated program
    pub program_name: String,
    /// GitHub API base URL for GitHub Enterprise
    pub github_base_url: Option<String>,
    pub write_policy_template: PathBuf,
    pub read_policy_template: PathBuf,
    /// Response-wrapping TTL for AppRole secret IDs
    pub secret_id_wrapping_ttl: Option<String>,
    pub no_color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            project: None,
            program_name: "vault-tenants".to_string(),
            github_base_url: None,
            write_policy_template: PathBuf::from(DEFAULT_WRITE_POLICY_TEMPLATE),
            read_policy_template: PathBuf::from(DEFAULT_READ_POLICY_TEMPLATE),
            secret_id_wrapping_ttl: None,
            no_color: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.config_path {
            None => {
                return Err(ProvisionError::config(
                    "Missing required configuration key 'config_path'. Use --config-path, \
                     set VAULT_TENANTS_CONFIG_PATH, or run 'vault-tenants config set config_path <DIR>'",
                ))
            }
            Some(path) if path.as_os_str().is_empty() => {
                return Err(ProvisionError::config("'config_path' must not be empty"))
            }
            _ => {}
        }

        if self.program_name.trim().is_empty() {
            return Err(ProvisionError::config("'program_name' must not be empty"));
        }

        Ok(())
    }

    /// Tenant directory; only valid after [`Config::validate`]
    pub fn tenant_dir(&self) -> Result<&Path> {
        self.config_path
            .as_deref()
            .ok_or_else(|| ProvisionError::config("Missing required configuration key 'config_path'"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        // XDG Base Directory layout on Linux and macOS
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            use std::env;
            let config_dir = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg_config_home)
            } else {
                let home_dir = env::var("HOME")
                    .map_err(|_| ProvisionError::config("HOME environment variable not set"))?;
                PathBuf::from(home_dir).join(".config")
            };
            Ok(config_dir.join("vault-tenants").join("config.toml"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let config_dir = dirs::config_dir()
                .ok_or_else(|| ProvisionError::config("Unable to determine config directory"))?;
            Ok(config_dir.join("vault-tenants").join("config.toml"))
        }
    }

    pub fn provision_settings(&self) -> ProvisionSettings {
        ProvisionSettings {
            gcp_project: self.project.clone(),
            write_policy_template: self.write_policy_template.clone(),
            read_policy_template: self.read_policy_template.clone(),
        }
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            github_base_url: self.github_base_url.clone(),
            secret_id_wrapping_ttl: self.secret_id_wrapping_ttl.clone(),
        }
    }

    /// Update a single setting by key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |value: &str| {
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };

        match key {
            "config_path" => self.config_path = optional(value).map(PathBuf::from),
            "project" => self.project = optional(value),
            "program_name" => self.program_name = value.to_string(),
            "github_base_url" => self.github_base_url = optional(value),
            "write_policy_template" => self.write_policy_template = PathBuf::from(value),
            "read_policy_template" => self.read_policy_template = PathBuf::from(value),
            "secret_id_wrapping_ttl" => self.secret_id_wrapping_ttl = optional(value),
            "no_color" => self.no_color = value.to_lowercase() == "true" || value == "1",
            _ => {
                return Err(ProvisionError::config(format!(
                    "Unknown configuration key: {key}. Available keys: {}",
                    CONFIG_KEYS.join(", ")
                )))
            }
        }

        Ok(())
    }
}

/// Load configuration from multiple sources with priority order:
/// 1. Command-line flags (applied by the caller)
/// 2. Environment variables
/// 3. Configuration file
/// 4. Default values
///
/// An explicitly named settings file must exist; the default one is optional.
pub fn load_config(settings_file: Option<&Path>) -> Result<Config> {
    let path = match settings_file {
        Some(path) => path.to_path_buf(),
        None => Config::get_config_path()?,
    };
    debug!("Loading settings from {}", path.display());

    let settings = config::Config::builder()
        .add_source(
            File::from(path.as_path())
                .format(FileFormat::Toml)
                .required(settings_file.is_some()),
        )
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Persist configuration as TOML
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| ProvisionError::serialization(e.to_string()))?;

    std::fs::write(path, contents)?;
    Ok(())
}

/// Write a default configuration file unless one already exists
pub fn init_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    save_config(&Config::default(), path)?;
    Ok(true)
}
