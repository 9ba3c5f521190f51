//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::SfuConfig;

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout stays clean for command output. `RUST_LOG`
/// takes precedence over the configured filter. Calling this twice is a
/// no-op; the first subscriber stays installed.
pub fn init_tracing(config: &SfuConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("sfu=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let installed = if config.log_json {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_ansi(false)
            .try_init()
            .is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(json = config.log_json, "Tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_noop() {
        let config = SfuConfig::default();
        init_tracing(&config);
        init_tracing(&config);
        tracing::info!("still logging");
    }
}
