//! Server-wide Vault configuration

use serde_json::json;
use tracing::debug;

use crate::engine::graph::ResourceGraph;
use crate::engine::models::{Resource, ResourceRef, ResourceType};
use crate::error::Result;

/// Register the server-wide audit device, logging to stdout
pub fn configure_server<G: ResourceGraph + ?Sized>(graph: &mut G) -> Result<ResourceRef> {
    debug!("Registering file audit device");

    graph.register(
        Resource::new("audit", ResourceType::Audit)
            .property("type", "file")
            .property("path", "file")
            .property("description", "")
            .property("options", json!({ "file_path": "stdout" }))
            .protect(false),
    )
}
