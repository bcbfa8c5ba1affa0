//! Colored logging module for GiantWatch

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing logger with colored output
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,giantwatch=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .init();
}

/// A wallet entered the giant list
#[macro_export]
macro_rules! log_giant {
    ($($arg:tt)*) => {
        tracing::info!(target: "GIANT", "🐋 {}", format!($($arg)*))
    };
}

/// A tracked giant moved
#[macro_export]
macro_rules! log_wake {
    ($($arg:tt)*) => {
        tracing::warn!(target: "WAKE_ALERT", "🚨 {}", format!($($arg)*))
    };
}
