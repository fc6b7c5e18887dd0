//! Console tracing for binaries and harnesses embedding the engine.
//!
//! The engine logs under the `carbon::draft`, `carbon::tx`,
//! `carbon::selection` and `carbon::node_map` targets.
//!
//! ```ignore
//! carbon_editor_core::telemetry::init(TelemetryConfig::from_env());
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Console level when `RUST_LOG` is unset (DEBUG in debug builds).
    pub console_level: Level,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };
        Self { console_level }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Install a compact console subscriber. `RUST_LOG` overrides the level.
///
/// Returns `false` if a global subscriber was already set.
pub fn init(config: TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(level = %config.console_level, "telemetry initialized");
    }
    installed
}
