use std::path::PathBuf;
use thiserror::Error;

/// Main error type for vault-tenants operations
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Malformed identity '{value}': {reason}")]
    MalformedIdentity { value: String, reason: String },

    #[error("Invalid tenant name '{name}': {reason}")]
    InvalidTenantName { name: String, reason: String },

    #[error("Tenant '{name}' declared in {file} was already declared in {first_file}")]
    DuplicateTenant {
        name: String,
        file: PathBuf,
        first_file: PathBuf,
    },

    #[error("Failed to parse tenant declarations in {path}: {source}")]
    DeclarationParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read policy template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy template {path}: {details}")]
    TemplateParse { path: PathBuf, details: String },

    #[error("Failed to render policy template {path}: {details}")]
    TemplateExecution { path: PathBuf, details: String },

    #[error("Resource '{name}' is already registered")]
    DuplicateResource { name: String },

    #[error("Resource '{name}' is not registered")]
    UnknownResource { name: String },

    #[error("Output '{key}' is already exported")]
    DuplicateOutput { key: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Configuration loading error: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
}

impl ProvisionError {
    pub fn malformed_identity<S: Into<String>, R: Into<String>>(value: S, reason: R) -> Self {
        Self::MalformedIdentity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_tenant_name<S: Into<String>, R: Into<String>>(name: S, reason: R) -> Self {
        Self::InvalidTenantName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn template_parse<P: Into<PathBuf>, S: Into<String>>(path: P, details: S) -> Self {
        Self::TemplateParse {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn template_execution<P: Into<PathBuf>, S: Into<String>>(path: P, details: S) -> Self {
        Self::TemplateExecution {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn duplicate_resource<S: Into<String>>(name: S) -> Self {
        Self::DuplicateResource { name: name.into() }
    }

    pub fn unknown_resource<S: Into<String>>(name: S) -> Self {
        Self::UnknownResource { name: name.into() }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type alias for vault-tenants operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
