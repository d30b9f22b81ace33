//! # Core Module
//!
//! Configuration shared by the bootstrap and the applications built on it.

pub mod config;

pub use config::{ContextConfig, WindowConfig};
