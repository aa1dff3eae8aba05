//! Configuration for relay
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > config file > built-in defaults.

mod config;

pub use config::*;
