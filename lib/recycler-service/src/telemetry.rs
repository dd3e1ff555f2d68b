//! Tracing subscriber setup shared by the binaries

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for CloudWatch
    Json,
    /// Human readable, for terminals
    Compact,
}

/// `RUST_LOG` wins; otherwise `debug` when requested, else `info`
pub fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber
pub fn init(format: LogFormat, debug: bool) -> Result<(), TryInitError> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(debug));
    match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_target(false)
            .finish()
            .try_init(),
        LogFormat::Compact => builder.compact().finish().try_init(),
    }
}
