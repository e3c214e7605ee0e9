//! Port traits for external collaborators.

pub mod cache_port;
pub mod config_port;
pub mod data_port;
