//! Filesystem side effects: evidence gathering, sidecar persistence, config.

pub mod artifacts;
pub mod config;
pub mod sidecar;
