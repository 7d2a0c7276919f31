//! Climate API Core Library
//!
//! Shared utilities for the API server and the sample-data loader:
//! - Configuration loading (XDG-compliant)
//! - File system utilities
//! - Common constants

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigSource};
pub use fs::{create_dir_all, path_exists};

/// Application name used for XDG paths
pub const APP_NAME: &str = "climate-api";

/// Default API port
pub const DEFAULT_API_PORT: u16 = 5000;

/// Default database name, resolved to `<data_dir>/<name>.sqlite`
pub const DEFAULT_DATABASE: &str = "climate_data";

/// Default directory holding the database file
pub const DEFAULT_DATA_DIR: &str = "./data";
