//! Tracing subscriber initialization
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! the host application's choice. This helper sets up the conventional
//! fmt + env-filter stack for hosts and tools that want output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to `trackcut=info`. Safe to call once per
/// process; later calls are ignored.
pub fn init() {
    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackcut=info".into()),
        )
        .with(tracing_subscriber::fmt::layer());
    if registry.try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
