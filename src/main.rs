use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fleet_risk_ranker::{
    config::{Config, ObservabilityConfig},
    metrics,
    ml::{Classifier, ModelArtifacts, RankingService},
    state::{JsonFileStore, VehicleStore},
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use validator::Validate;

#[derive(Parser)]
#[command(name = "fleet-risk-ranker")]
#[command(about = "Rank vehicles by predicted failure urgency", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "FLEET_RISK_CONFIG")]
    config: Option<PathBuf>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score and rank every vehicle in a records file
    Rank {
        /// JSON array of raw vehicle records
        #[arg(short, long)]
        records: PathBuf,

        /// Only rank vehicles owned by this user
        #[arg(short, long)]
        user_id: Option<String>,

        /// Reference date for maintenance checks (YYYY-MM-DD)
        #[arg(short, long)]
        today: Option<NaiveDate>,

        /// Pretty-print the report
        #[arg(short, long)]
        pretty: bool,
    },

    /// Score a single vehicle
    Score {
        #[arg(short, long)]
        records: PathBuf,

        #[arg(short, long)]
        vehicle_id: String,
    },

    /// Show model metadata and the feature schema
    Inspect,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(&path.to_string_lossy()),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.observability);
    tracing::info!("Starting fleet risk ranker v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let artifacts = ModelArtifacts::load(&config.artifacts).context("Failed to load model artifacts")?;
    let service = RankingService::new(artifacts, &config.features, config.ranking.clone());

    match cli.command {
        Commands::Rank {
            records,
            user_id,
            today,
            pretty,
        } => {
            let store = JsonFileStore::open(&records)?;
            let today = today.unwrap_or_else(|| chrono::Utc::now().date_naive());

            let report = match user_id {
                Some(user_id) => {
                    let owned = store.records_for_user(&user_id)?;
                    service.rank_at(&owned, today)?
                }
                None => service.rank_at(&store.list_records()?, today)?,
            };

            if !report.skipped.is_empty() {
                tracing::warn!(
                    skipped = report.skipped.len(),
                    summary = ?report.skip_summary(),
                    "Some vehicle records were skipped"
                );
            }
            print_json(&report, pretty)?;
        }
        Commands::Score {
            records,
            vehicle_id,
        } => {
            let store = JsonFileStore::open(&records)?;
            let Some(record) = store.get_record(&vehicle_id)? else {
                bail!("Vehicle {} not found in {}", vehicle_id, records.display());
            };

            let result = service
                .score_record(&record)
                .with_context(|| format!("Failed to score vehicle {}", vehicle_id))?;
            print_json(&result, true)?;
        }
        Commands::Inspect => {
            let classifier = service.classifier();
            let schema = service.transformer().schema();
            let summary = json!({
                "model": classifier.metadata(),
                "classes": classifier.classes(),
                "normalizer": service.transformer().normalizer_kind(),
                "emitted_features": schema.emitted(),
                "schema_ok": service.transformer().check_schema().is_ok(),
            });
            print_json(&summary, true)?;
        }
    }

    if cli.metrics {
        print!("{}", metrics::gather_metrics());
    }

    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("fleet_risk_ranker={}", observability.log_level).into());

    // Logs go to stderr; stdout carries the JSON output
    let fmt_layer = if observability.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}
