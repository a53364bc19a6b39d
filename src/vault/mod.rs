//! Vault stack module
//!
//! This module provides the server-wide Vault configuration and the
//! manager that drives a complete provisioning run.

pub mod manager;
pub mod server;

pub use manager::*;
pub use server::*;
