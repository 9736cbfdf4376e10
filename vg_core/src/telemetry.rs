//! ABOUTME: Tracing subscriber setup for the vigil binary and tests
//! ABOUTME: JSON lines in production, human-readable output elsewhere

use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Variable checked before `RUST_LOG` for filter directives
pub const LOG_ENV_VAR: &str = "VIGIL_LOG";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// `production` logs JSON, `test` stays compact, anything else is pretty
    pub fn for_env(env: &str) -> Self {
        match env {
            "production" => LogFormat::Json,
            "test" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing - safe to call multiple times
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter());

        // try_init leaves an already installed global subscriber in place
        let installed = match LogFormat::for_env(env) {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init(),
            LogFormat::Compact => registry
                .with(tracing_subscriber::fmt::layer().compact().with_test_writer())
                .try_init(),
        };

        if installed.is_ok() {
            tracing::info!(service = %service, env = %env, "Tracing initialized");
        }
    });
}
