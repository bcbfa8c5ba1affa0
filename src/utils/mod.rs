//! Utility modules

pub mod alerts;
pub mod logger;
pub mod metrics;
pub mod price;
pub mod scheduler;
pub mod settings;
pub mod solana;
pub mod solscan;

pub use alerts::{AlertLog, NotificationDispatcher};
pub use logger::init_logger;
pub use metrics::MetricsService;
pub use price::JupiterPriceOracle;
pub use settings::SettingsStore;
pub use solana::SolanaService;
pub use solscan::SolscanClient;
