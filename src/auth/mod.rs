//! Authentication module
//!
//! This module consolidates the GitHub team and AppRole bindings declared
//! by every tenant and turns them into Vault auth backends, team bindings
//! and AppRole definitions.

pub mod aggregator;
pub mod materializer;

pub use aggregator::*;
pub use materializer::*;
