//! Configuration for sesame.
//!
//! Provides TOML-based configuration with:
//! - Session cookie and expiry settings (`[session]`)
//! - Database location and sweep interval (`[store]`)
//! - Log directory and level (`[logging]`)
//! - Config file layering (user config, project-local, explicit file)
//! - Environment overrides (`SESAME_DB_PATH`, `SESAME_COOKIE_AGE`)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, apply_env_overrides, default_data_dir, load_config,
    load_config_file, load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
