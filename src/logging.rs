//! Structured logging setup

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global tracing subscriber once per process
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. An
/// already installed global subscriber is left in place.
pub fn init_tracing() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let result = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init();

        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }
    });
}
