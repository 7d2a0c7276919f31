use clap::Parser;
use climate_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_API_PORT, DEFAULT_DATABASE,
    DEFAULT_DATA_DIR,
};
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};
use log::{info, warn, LevelFilter};
use std::{env, path::Path};
use time::{format_description::well_known::Iso8601, OffsetDateTime};

use crate::{TrendConfig, DEFAULT_TREND_EPSILON};

pub use climate_core::{create_dir_all, path_exists};

pub const CONFIG_ENV_VAR: &str = "CLIMATE_API_CONFIG";
pub const CONFIG_FILE_NAME: &str = "climate.toml";

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Climate API - read-only climate observations with quality-weighted analytics"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $CLIMATE_API_CONFIG, ./climate.toml,
    /// $XDG_CONFIG_HOME/climate-api/climate.toml, /etc/climate-api/climate.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "CLIMATE_API_LEVEL")]
    pub level: Option<String>,

    /// Host to listen on (use 0.0.0.0 for all interfaces)
    #[arg(long, env = "CLIMATE_API_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CLIMATE_API_PORT")]
    pub port: Option<u16>,

    /// Directory holding the sqlite database
    #[arg(short, long, env = "CLIMATE_API_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Database name, stored as <data_dir>/<database>.sqlite
    #[arg(long, env = "CLIMATE_API_DATABASE")]
    pub database: Option<String>,

    /// Slopes (value units per day) at or below this magnitude are reported as stable
    #[arg(long, env = "CLIMATE_API_TREND_EPSILON")]
    pub trend_epsilon: Option<f64>,
}

impl Cli {
    pub fn host(&self) -> String {
        self.host.clone().unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_API_PORT)
    }

    pub fn data_dir(&self) -> String {
        self.data_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
    }

    pub fn database(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
    }

    pub fn db_path(&self) -> String {
        Path::new(&self.data_dir())
            .join(format!("{}.sqlite", self.database()))
            .to_string_lossy()
            .into_owned()
    }

    pub fn trend_config(&self) -> TrendConfig {
        TrendConfig::with_epsilon(self.trend_epsilon.unwrap_or(DEFAULT_TREND_EPSILON))
    }

    /// Values set here win; anything unset falls back to `file`.
    pub fn merge(self, file: Cli) -> Cli {
        Cli {
            config: self.config,
            level: self.level.or(file.level),
            host: self.host.or(file.host),
            port: self.port.or(file.port),
            data_dir: self.data_dir.or(file.data_dir),
            database: self.database.or(file.database),
            trend_epsilon: self.trend_epsilon.or(file.trend_epsilon),
        }
    }
}

/// Command line values merged over the config file, plus what went wrong reading it.
pub struct LoadedConfig {
    pub cli: Cli,
    pub source: ConfigSource,
    /// Set when the file behind `source` could not be read or parsed
    pub file_error: Option<anyhow::Error>,
}

impl LoadedConfig {
    /// An unreadable or malformed file contributes nothing; the error is kept for `log_source`.
    pub fn load(args: Cli, source: ConfigSource) -> Self {
        let (file_config, file_error) = match load_config::<Cli>(&source) {
            Ok(config) => (config, None),
            Err(e) => (Cli::default(), Some(e)),
        };
        Self {
            cli: args.merge(file_config),
            source,
            file_error,
        }
    }

    /// Call once the logger is installed.
    pub fn log_source(&self) {
        if let Some(path) = self.source.path() {
            info!("Loading config from: {}", path.display());
        }
        if let Some(e) = &self.file_error {
            warn!("ignoring config file {}, using defaults: {:#}", self.source, e);
        }
    }
}

pub fn config_source(explicit: Option<&str>) -> ConfigSource {
    match explicit {
        Some(path) => ConfigSource::Explicit(path.into()),
        None => find_config_file(CONFIG_ENV_VAR, CONFIG_FILE_NAME),
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> LoadedConfig {
    // env vars are handled by clap, so they already sit in the parsed args
    let cli_args = Cli::parse();
    let source = config_source(cli_args.config.as_deref());
    LoadedConfig::load(cli_args, source)
}

pub fn get_log_level(level: Option<&str>) -> LevelFilter {
    let level_str = level
        .map(str::to_owned)
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    match level_str.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

pub fn setup_logger() -> Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = OffsetDateTime::now_utc();
            out.finish(format_args!(
                "[{} {}] {}: {}",
                now.format(&Iso8601::DEFAULT)
                    .unwrap_or_else(|_| now.to_string()),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .chain(std::io::stdout())
}
