// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Human-readable lines, for local runs.
    Pretty,
}

/// Initializes the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` overrides `default_filter`, e.g. `RUST_LOG=consensus=debug,chain=info`.
/// Per-chain spans (`chain_id`) are attached to every event emitted inside them.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_log::LogTracer::init()?;
    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(fmt_layer))?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            tracing::subscriber::set_global_default(Registry::default().with(filter).with(fmt_layer))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_subscriber_installs_once() {
        init_tracing(LogFormat::Pretty, "info").unwrap();
        assert!(init_tracing(LogFormat::Json, "debug").is_err());
        tracing::info!(target: "chain", chain_id = 1, "subscriber installed");
    }
}
