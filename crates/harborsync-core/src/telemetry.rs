//! Tracing setup for hosts and test harnesses.
//!
//! The engine only emits `tracing` events; the embedding process decides
//! where they go. [`init_tracing`] wires a global subscriber for hosts
//! that do not bring their own. Calling it when a subscriber is already
//! installed is a no-op, so tests can call it unconditionally.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-global tracing subscriber.
///
/// `json` switches output to newline-delimited JSON for log shippers;
/// otherwise events render as compact human-readable lines. `level` is
/// the default verbosity; a set `RUST_LOG` overrides it entirely.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    // try_init keeps an already-installed subscriber (an embedder's own,
    // or a previous call) in place.
    let _ = if json {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()
    };
}
