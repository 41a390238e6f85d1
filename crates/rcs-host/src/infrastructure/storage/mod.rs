//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform config directory (or an explicit path), validates it, and turns
//! it into the engine's settings.  A missing file means "all defaults".

pub mod config;
