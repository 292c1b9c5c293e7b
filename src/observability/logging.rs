//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once, in the binary
//! - Pick the default level from `DEBUG` and the format from `LOG_FORMAT`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` always wins over the computed default
//! - JSON format for production, pretty format for development

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging options read before the rest of the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Trace-level logging for this crate.
    pub debug: bool,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl LogOptions {
    /// Read `DEBUG` and `LOG_FORMAT` through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            debug: lookup("DEBUG").map(|v| !v.is_empty()).unwrap_or(false),
            json: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> &'static str {
        if self.debug {
            "control_gateway=trace,tower_http=debug,axum_server=debug"
        } else {
            "control_gateway=info,tower_http=info"
        }
    }
}

/// Install the global subscriber.
pub fn init(options: LogOptions) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| options.default_directive().into());

    tracing_subscriber::registry()
        .with(filter)
        .with(options.json.then(|| fmt::layer().json()))
        .with((!options.json).then(fmt::layer))
        .try_init()
}
