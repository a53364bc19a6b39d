//! Provisioning engine module
//!
//! This module models the resource graph handed to the infrastructure
//! provisioning engine: resource records, cross-resource references and the
//! program document they are written out as.

pub mod graph;
pub mod models;

pub use graph::*;
pub use models::*;
