//! GiantWatch detection and monitoring modules

pub mod classifier;
pub mod giant_detector;
pub mod giant_watcher;
pub mod movement_monitor;

pub use giant_detector::GiantDetector;
pub use giant_watcher::GiantWatcher;
pub use movement_monitor::MovementMonitor;
