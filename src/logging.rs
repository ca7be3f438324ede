//! Logging setup and the logger handed to the job.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already exist (tests, embedding); keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Logging capability used by the reconciliation job.
pub trait JobLogger {
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards job messages to `tracing`.
///
/// Job progress goes out at `info` so a plain run shows it; `--verbose`
/// only adds the per-request client lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl JobLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::info!(target: "shipment_kpi::job", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "shipment_kpi::job", "{message}");
    }
}

impl<L: JobLogger + ?Sized> JobLogger for &L {
    fn debug(&self, message: &str) {
        (**self).debug(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}
