//! Tracing setup for the command-line tool. Library code only emits events;
//! installing a subscriber is the binary's job.

use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV_VAR: &str = "LCI_QAQC_LOG";
pub const LOG_JSON_ENV_VAR: &str = "LCI_QAQC_LOG_JSON";

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Install a stderr subscriber filtered by `LCI_QAQC_LOG` (default `info`).
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if env_bool(LOG_JSON_ENV_VAR, false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("tracing already initialized: {err}");
    }
}
