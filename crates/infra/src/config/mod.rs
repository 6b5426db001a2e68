//! Configuration loading and management
//!
//! This module provides utilities for loading provider settings from
//! files and environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file};
