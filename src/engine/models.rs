//! Resource graph data models
//!
//! This module defines the declarative resource records handed to the
//! provisioning engine and the program document they are collected into.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Resource types understood by the provisioning engine
///
/// `TenantPrefix` and `Authentication` are component resources: they carry
/// no properties and only group their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    TenantPrefix,
    Authentication,
    Audit,
    Policy,
    Mount,
    AuthBackend,
    GithubAuthBackend,
    GithubTeam,
    GcpAuthBackend,
    GcpAuthBackendRole,
    GcpSecretBackend,
    GcpSecretRoleset,
    AppRoleAuthBackendRole,
    AppRoleAuthBackendRoleSecretId,
}

impl ResourceType {
    /// Provider type token as written into the program document
    pub fn token(&self) -> &'static str {
        match self {
            ResourceType::TenantPrefix => "vault-tenants:index:TenantPrefix",
            ResourceType::Authentication => "vault-tenants:index:Authentication",
            ResourceType::Audit => "vault:index:Audit",
            ResourceType::Policy => "vault:index:Policy",
            ResourceType::Mount => "vault:index:Mount",
            ResourceType::AuthBackend => "vault:index:AuthBackend",
            ResourceType::GithubAuthBackend => "vault:github:AuthBackend",
            ResourceType::GithubTeam => "vault:github:Team",
            ResourceType::GcpAuthBackend => "vault:gcp:AuthBackend",
            ResourceType::GcpAuthBackendRole => "vault:gcp:AuthBackendRole",
            ResourceType::GcpSecretBackend => "vault:gcp:SecretBackend",
            ResourceType::GcpSecretRoleset => "vault:gcp:SecretRoleset",
            ResourceType::AppRoleAuthBackendRole => "vault:appRole:AuthBackendRole",
            ResourceType::AppRoleAuthBackendRoleSecretId => "vault:appRole:AuthBackendRoleSecretId",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Handle to a resource already registered with the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    name: String,
    resource_type: ResourceType,
}

impl ResourceRef {
    pub fn new<S: Into<String>>(name: S, resource_type: ResourceType) -> Self {
        Self {
            name: name.into(),
            resource_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Reference to one of the resource's attributes, resolved by the engine at apply time
    pub fn output(&self, attribute: &str) -> Value {
        Value::String(format!("${{{}.{}}}", self.name, attribute))
    }

    pub fn id(&self) -> Value {
        self.output("id")
    }

    /// Reference to the resource itself, as used by the `parent` option
    pub fn reference(&self) -> String {
        format!("${{{}}}", self.name)
    }
}

/// Engine-level options attached to a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_before_replace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
}

impl ResourceOptions {
    pub fn is_empty(&self) -> bool {
        self.parent.is_none() && self.delete_before_replace.is_none() && self.protect.is_none()
    }
}

/// A single declarative resource registration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub resource_type: ResourceType,
    pub properties: Map<String, Value>,
    pub options: ResourceOptions,
}

impl Resource {
    pub fn new<S: Into<String>>(name: S, resource_type: ResourceType) -> Self {
        Self {
            name: name.into(),
            resource_type,
            properties: Map::new(),
            options: ResourceOptions::default(),
        }
    }

    pub fn property<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Set a property only when a value is present
    pub fn optional_property<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.property(key, value),
            None => self,
        }
    }

    pub fn parent(mut self, parent: &ResourceRef) -> Self {
        self.options.parent = Some(parent.reference());
        self
    }

    pub fn delete_before_replace(mut self) -> Self {
        self.options.delete_before_replace = Some(true);
        self
    }

    pub fn protect(mut self, protect: bool) -> Self {
        self.options.protect = Some(protect);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Name of the parent resource, if any
    pub fn parent_name(&self) -> Option<&str> {
        self.options
            .parent
            .as_deref()
            .and_then(|p| p.strip_prefix("${"))
            .and_then(|p| p.strip_suffix('}'))
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(self.name.clone(), self.resource_type)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.resource_type.token())?;
        if !self.properties.is_empty() {
            map.serialize_entry("properties", &self.properties)?;
        }
        if !self.options.is_empty() {
            map.serialize_entry("options", &self.options)?;
        }
        map.end()
    }
}

/// Declarative program document: every registered resource and exported
/// output, in registration order
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    resources: Vec<Resource>,
    outputs: Vec<(String, Value)>,
}

impl Program {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub(crate) fn push_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub(crate) fn push_output(&mut self, key: String, value: Value) {
        self.outputs.push((key, value));
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[(String, Value)] {
        &self.outputs
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resources_of_type(&self, resource_type: ResourceType) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

struct OrderedResources<'a>(&'a [Resource]);

impl Serialize for OrderedResources<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for resource in self.0 {
            map.serialize_entry(&resource.name, resource)?;
        }
        map.end()
    }
}

struct OrderedOutputs<'a>(&'a [(String, Value)]);

impl Serialize for OrderedOutputs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Program {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("runtime", "yaml")?;
        map.serialize_entry("resources", &OrderedResources(&self.resources))?;
        if !self.outputs.is_empty() {
            map.serialize_entry("outputs", &OrderedOutputs(&self.outputs))?;
        }
        map.end()
    }
}
