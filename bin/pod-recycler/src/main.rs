use aws_config::{BehaviorVersion, Region};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use recycler_api::{InvocationResponse, RecycleRequest};
use recycler_eks::install_crypto_provider;
use recycler_service::settings::{flag_enabled, DEBUG_VAR};
use recycler_service::{telemetry, LogFormat, RecycleService, RecyclerSettings};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::info;

/// Time reserved to serialize the response before Lambda cuts the invocation
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Error> {
    install_crypto_provider();
    telemetry::init(
        LogFormat::Json,
        flag_enabled(std::env::var(DEBUG_VAR).ok().as_deref()),
    )?;

    let settings = RecyclerSettings::from_env()?;
    info!(
        region = %settings.region,
        cluster = settings.cluster_id.as_deref().unwrap_or("<per request>"),
        allowed = %settings.allowed_namespaces.describe(),
        "Starting pod-recycler"
    );

    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .load()
        .await;
    let service = RecycleService::for_eks(settings, &sdk);
    let service = &service;

    run(service_fn(move |event: LambdaEvent<RecycleRequest>| async move {
        handle(service, event).await
    }))
    .await
}

async fn handle(
    service: &RecycleService,
    event: LambdaEvent<RecycleRequest>,
) -> Result<InvocationResponse, Error> {
    let deadline = operation_deadline(event.context.deadline, SystemTime::now());
    Ok(service
        .invoke(event.payload, deadline, &event.context.request_id)
        .await)
}

/// Convert the context deadline (ms since the epoch) into a local instant, less the grace period
fn operation_deadline(deadline_ms: u64, now: SystemTime) -> Option<Instant> {
    if deadline_ms == 0 {
        return None;
    }
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
    let remaining = deadline
        .duration_since(now)
        .unwrap_or_default()
        .saturating_sub(DEADLINE_GRACE);
    Some(Instant::now() + remaining)
}
