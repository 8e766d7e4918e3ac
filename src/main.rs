/// SPAship SSR environment requests
use std::path::PathBuf;
use std::sync::Arc;
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use thiserror::Error;
use spaship_ssr::config::file::Mode;
use spaship_ssr::config::{self, Properties};
use spaship_ssr::executor::WorkerPool;
use spaship_ssr::provisioner::{Hook, Plan, Provisioner};
use spaship_ssr::{processor, EnvironmentDescriptor, RequestProcessor};

/// Provision, update and delete SPA/SSR environments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file. Also the properties file `operator.domain.name` is read from.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new environment, applying its config map first when it has one.
    Provision {
        /// Request file, JSON if it ends in `.json`, YAML otherwise.
        request: String,
    },
    /// Roll an existing environment to the image in the request.
    Update { request: String },
    /// Delete an environment.
    Delete { request: String },
    /// Create or update the config map of an environment.
    ConfigUpdate { request: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file: {0}")]
    ConfigParse(#[from] config::file::Error),

    #[error("read {path}: {err}")]
    ReadRequest {
        err: std::io::Error,
        path: String,
    },

    #[error("request {path}: {err}")]
    JsonRequest {
        err: serde_json::Error,
        path: String,
    },

    #[error("request {path}: {err}")]
    YamlRequest {
        err: serde_yaml::Error,
        path: String,
    },

    #[error(transparent)]
    Request(#[from] processor::Error),
}

/// Read configuration file from disk and merge it with the
/// `default.toml` built-in config.
///
/// Without an explicit `--config`, `ssr.toml` in the working directory is
/// used when it exists.
fn config_path(args: &Cli) -> Option<String> {
    const DEFAULT_CONFIG_FILE: &str = "ssr.toml";

    match &args.config {
        Some(c) => Some(c.clone()),
        None => std::fs::metadata(DEFAULT_CONFIG_FILE)
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
            .then(|| DEFAULT_CONFIG_FILE.to_string()),
    }
}

fn read_config(path: Option<&str>) -> Result<config::file::File, Error> {
    Ok(match path {
        Some(path) => config::file::File::default_with_user_config_file(path)?,
        None => config::file::File::default(),
    })
}

fn read_request(path: &str) -> Result<EnvironmentDescriptor, Error> {
    let data = std::fs::read_to_string(path).map_err(|err| Error::ReadRequest {
        err,
        path: path.to_string(),
    })?;
    if path.ends_with(".json") {
        serde_json::from_str(&data).map_err(|err| Error::JsonRequest { err, path: path.to_string() })
    } else {
        serde_yaml::from_str(&data).map_err(|err| Error::YamlRequest { err, path: path.to_string() })
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err.to_string());
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let config_path = config_path(&args);
    let cfg = read_config(config_path.as_deref())?;

    let provisioner: Arc<dyn Provisioner> = match cfg.provisioner.mode {
        Mode::Plan => Arc::new(Plan),
        Mode::Hook => Arc::new(Hook::new(cfg.provisioner.program.clone(), cfg.provisioner.wait)),
    };
    debug!("provisioner mode {:?}", cfg.provisioner.mode);

    let processor = RequestProcessor::new(
        provisioner,
        Arc::new(Properties::new(config_path.map(PathBuf::from))),
        Arc::new(WorkerPool::with_default_parallelism()),
    );

    let outcome = match args.command {
        Commands::Provision { request } => processor.provision(read_request(&request)?).await?,
        Commands::Update { request } => processor.update(read_request(&request)?).await?,
        Commands::Delete { request } => processor.delete(read_request(&request)?).await?,
        Commands::ConfigUpdate { request } => processor.update_config_map(read_request(&request)?).await?,
    };
    info!("request completed with status {:?}", outcome.status);
    println!("{outcome}");
    Ok(())
}
