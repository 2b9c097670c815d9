//! Telemetry and Observability
//!
//! Sets up `tracing-subscriber` for the engine and the two HTTP services it
//! hosts. Log level comes from config or the CLI, `RUST_LOG` overrides both,
//! and the output format switches between pretty (debug) and JSON (release).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events follow the configured level
const NIMBUS_TARGETS: [&str; 3] = ["nimbus_engine", "api_server", "weather_server"];

/// Filter directive used when `RUST_LOG` is unset
fn default_directive(log_level: &str) -> String {
    let mut directive = String::from("warn");
    for target in NIMBUS_TARGETS {
        directive.push_str(&format!(",{}={}", target, log_level));
    }
    directive
}

/// Initialize the tracing subscriber with the given log level.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter.
///
/// In debug builds: pretty-printed terminal output.
/// In release builds: JSON structured output with spans.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}
