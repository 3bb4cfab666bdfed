//! Default subscriber for binaries embedding the pipeline.

use std::sync::Once;

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`) that
/// prints through the progress bars instead of tearing them. Calling it more
/// than once is harmless.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let indicatif = IndicatifLayer::new();

        // Another global subscriber may already be installed by the host.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(indicatif.get_stderr_writer()))
            .with(indicatif)
            .try_init();
    });
}
