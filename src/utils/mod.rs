//! Utility functions module
//!
//! This module contains name validation and output formatting helpers.

pub mod format;
pub mod sanitizer;

pub use format::*;
pub use sanitizer::*;
