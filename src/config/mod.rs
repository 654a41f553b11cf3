//! Configuration module for HPCBridge
//!
//! Provides the command line settings and the per-cluster credential store.

mod cluster;
mod settings;

pub use cluster::*;
pub use settings::*;
