//! Configuration for the Agent700 CLI.
//!
//! Settings are layered: built-in defaults, then `config.yaml`, then a
//! `.env` file, then the process environment, then command-line flags.
//! Resolution itself is a pure function over an environment lookup so it
//! can be tested without touching the real environment.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadOptions, LoadedConfig, config_dir, config_path, default_data_dir, load_config,
    load_config_file, log_dir, read_env_file,
};
pub use error::{ConfigError, Result};
pub use types::*;
