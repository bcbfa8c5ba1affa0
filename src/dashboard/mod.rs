//! Dashboard HTTP API

pub mod server;

pub use server::DashboardServer;
