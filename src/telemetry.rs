use anyhow::{bail, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Structured diagnostics format for the tracing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{other}' (expected text or json)"),
        }
    }
}

fn build_filter(log_level: &str) -> EnvFilter {
    // RUST_LOG wins over the configured level
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize tracing. Diagnostics go to stderr so stdout stays reserved for
/// the progress report and the summary.
pub fn init_telemetry(log_level: &str, log_format: &str) -> Result<()> {
    let filter = build_filter(log_level);

    match LogFormat::parse(log_format)? {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?,
    }

    tracing::debug!("telemetry initialized");
    Ok(())
}

/// Generate an id linking every log line and the summary of one run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}
