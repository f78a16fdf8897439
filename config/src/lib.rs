//! gtools configuration
//!
//! Loads the server configuration from an optional TOML or JSON file and
//! environment variables.
//!
//! - [`settings`]: the configuration model and its defaults
//! - [`loader`]: file parsing and environment overrides
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gtools_config::ConfigLoader;
//!
//! let config = ConfigLoader::from_env().load().unwrap();
//! println!("Backups go to {}", config.backup_dir.display());
//! ```

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::{apply_overrides, load_file, save_toml, ConfigLoader, CONFIG_FILE_ENV};
pub use settings::{Config, DEFAULT_OPERATION_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SCOPES};
