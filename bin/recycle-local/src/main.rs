//! Run a recycle event from the command line, outside Lambda.
//!
//! Uses the same settings, credentials chain and operation as the function,
//! so it doubles as a smoke test against a real cluster.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use recycler_api::RecycleRequest;
use recycler_eks::install_crypto_provider;
use recycler_service::settings::{flag_enabled, DEBUG_VAR};
use recycler_service::{telemetry, LogFormat, RecycleService, RecyclerSettings};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "recycle-local")]
#[command(about = "Recycle pods described by an event file, as the Lambda function would")]
struct Cli {
    /// Event JSON file, or `-` to read stdin
    event: PathBuf,

    /// Cluster name or alias; overrides the event and EKS_CLUSTER_NAME
    #[arg(short = 'c', long)]
    cluster: Option<String>,

    /// Maximum deletions in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log at debug level (also enabled by DEBUG=true)
    #[arg(short = 'v', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    install_crypto_provider();
    let debug = cli.debug || flag_enabled(std::env::var(DEBUG_VAR).ok().as_deref());
    telemetry::init(LogFormat::Compact, debug)?;

    let mut settings = RecyclerSettings::from_env().context("failed to read settings")?;
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency.max(1);
    }

    let mut request = read_event(&cli.event)?;
    if let Some(cluster) = cli.cluster {
        request.cluster_id = Some(cluster);
    }

    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .load()
        .await;
    let service = RecycleService::for_eks(settings, &sdk);

    let invocation_id = Uuid::new_v4().to_string();
    info!("Running invocation {}", invocation_id);
    let response = service.invoke(request, None, &invocation_id).await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn read_event(path: &Path) -> Result<RecycleRequest> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read event from stdin")?;
        raw
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))?
    };
    parse_event(&raw).with_context(|| format!("invalid event in {}", path.display()))
}

fn parse_event(raw: &str) -> Result<RecycleRequest> {
    Ok(serde_json::from_str(raw)?)
}
