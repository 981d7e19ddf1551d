use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use smart_mining::config::Config;
use smart_mining::inference::{predict_baseline, ModelContext};
use smart_mining::logging;
use smart_mining::metrics;
use smart_mining::pipeline::{Ingestor, Storage};
use smart_mining::pipeline::storage::SqliteStorage;
use smart_mining::server::{start_server, AppState};
use smart_mining::types::FeaturePoint;

#[derive(Parser)]
#[command(name = "smart_mining")]
#[command(about = "Drill-hole grade ingestion and prediction service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ingest a CSV file into the forage store
    Ingest {
        /// CSV file; defaults to the single *.csv in the data directory
        file: Option<PathBuf>,
    },
    /// Predict the grade at one point
    Predict {
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        z: f64,
        /// Use the mean-grade baseline instead of the transform chain
        #[arg(long)]
        baseline: bool,
    },
    /// Report which model artifacts are loaded
    ModelStatus,
}

/// The single `*.csv` file in `dir`. Zero or several candidates is an error.
fn locate_csv(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    candidates.sort();

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => anyhow::bail!("No CSV file found in '{}'", dir.display()),
        n => anyhow::bail!(
            "Found {} CSV files in '{}', pass one explicitly: {}",
            n,
            dir.display(),
            candidates
                .iter()
                .filter_map(|p| p.file_name().and_then(|f| f.to_str()))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let store = SqliteStorage::open(&config.database.path)
        .with_context(|| format!("opening forage store at {}", config.database.path.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();
            let storage = open_store(&config)?;
            let model = Arc::new(ModelContext::load(&config.model.dir, config.model.name.clone()));
            let port = port.unwrap_or(config.server.port);

            start_server(AppState::new(storage, model), &config.server.host, port).await?;
        }
        Commands::Ingest { file } => {
            let path = match file {
                Some(path) => path,
                None => locate_csv(&config.ingest.data_dir)?,
            };
            info!("Ingesting {}", path.display());
            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;

            let ingestor = Ingestor::new(open_store(&config)?);
            match ingestor.ingest_csv(&bytes).await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    error!("Ingest of {} failed: {}", path.display(), e);
                    return Err(e.into());
                }
            }
        }
        Commands::Predict { x, y, z, baseline } => {
            let point = FeaturePoint::new(x, y, z);
            let prediction = if baseline {
                let storage = open_store(&config)?;
                predict_baseline(storage.as_ref(), point).await?
            } else {
                ModelContext::load(&config.model.dir, config.model.name.clone()).predict(point)?
            };
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::ModelStatus => {
            let model = ModelContext::load(&config.model.dir, config.model.name.clone());
            println!("{}", serde_json::to_string_pretty(&model.status())?);
        }
    }

    Ok(())
}
