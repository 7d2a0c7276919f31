use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use climate_api::{
    config_source, create_dir_all, get_log_level, load_sample, path_exists, setup_logger,
    ClimateAccess, Cli, LoadedConfig, QualityTable, SampleData,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "climate-load")]
#[command(about = "Recreate the climate database from a sample document")]
#[command(version)]
struct LoadCli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML format), shared with climate-api
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, global = true, env = "CLIMATE_API_LEVEL")]
    level: Option<String>,

    /// Directory holding the sqlite database
    #[arg(short, long, global = true, env = "CLIMATE_API_DATA_DIR")]
    data_dir: Option<String>,

    /// Database name, stored as <data_dir>/<database>.sqlite
    #[arg(long, global = true, env = "CLIMATE_API_DATABASE")]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate every table, then load `{locations, metrics, climate_data}`
    CreateSample {
        /// JSON sample document
        data_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = LoadCli::parse();

    let overrides = Cli {
        config: args.config.clone(),
        level: args.level.clone(),
        data_dir: args.data_dir.clone(),
        database: args.database.clone(),
        ..Default::default()
    };
    let config = LoadedConfig::load(overrides, config_source(args.config.as_deref()));
    let cli = &config.cli;

    setup_logger()
        .level(get_log_level(cli.level.as_deref()))
        .level_for("sqlx", log::LevelFilter::Warn)
        .apply()?;
    config.log_source();

    match args.command {
        Commands::CreateSample { data_file } => {
            let path = data_file.to_string_lossy();
            if !path_exists(&path) {
                bail!("sample document {} does not exist", path);
            }

            let data_dir = cli.data_dir();
            create_dir_all(&data_dir).map_err(|e| anyhow!("error creating {}: {}", data_dir, e))?;

            let db_path = cli.db_path();
            info!("loading {} into {}", path, db_path);
            let access = ClimateAccess::new(&db_path).await?;
            let data = SampleData::from_file(&data_file).await?;
            let summary = load_sample(access.pool(), &data, &QualityTable::seeded()).await?;
            info!(
                "database ready: {} locations, {} metrics, {} observations",
                summary.locations, summary.metrics, summary.observations
            );
        }
    }

    Ok(())
}
