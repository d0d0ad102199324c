//! Adonis WebSocket client - Main Library
//!
//! This crate wires the `adonis-ws` engine to configuration, logging and the
//! `adonis_listen` binary.
//!
//! ## Architecture
//!
//! - **adonis_ws**: Protocol engine (re-exported from workspace)
//! - **config**: YAML listener configuration
//! - **logging**: tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use adonis_client::bin_common::{load_config_from_env, ConfigType};
//! use adonis_client::config::ListenConfig;
//! ```

// Re-export workspace libraries for convenience
pub use adonis_ws;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
