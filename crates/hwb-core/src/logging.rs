use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the bot.
pub fn init(service_name: &str) -> Result<()> {
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(service_name));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("failed to init logging: {e}")))
}

fn default_filter(service_name: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "info,hwb_core=info,hwb_ssh=info,hwb_postgres=info,hwb_telegram=info,{service_name}=info"
    ))
}
