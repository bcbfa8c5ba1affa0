//! Prometheus metrics service for GiantWatch

use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::time::Instant;
use tracing::{error, info};

/// Metrics service for Prometheus
pub struct MetricsService {
    registry: Registry,
    start_time: Instant,

    // Giant Detector metrics
    pub detection_passes: Counter,
    pub giants: Gauge,
    pub fetch_failures: CounterVec,

    // Movement Monitor metrics
    pub tracked_wallets: Gauge,
    pub wakeups: CounterVec,
    pub skipped_checks: Counter,

    // System metrics
    pub notifications: CounterVec,
    pub module_status: GaugeVec,
    pub uptime: Gauge,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new() -> Self {
        let registry = Registry::new();

        let detection_passes = Counter::new(
            "giantwatch_detection_passes_total",
            "Giant detection passes run",
        )
        .expect("valid metric");
        let giants = Gauge::new("giantwatch_giants", "Sleeping giants currently listed")
            .expect("valid metric");
        let fetch_failures = CounterVec::new(
            Opts::new("giantwatch_fetch_failures_total", "Data source fetch failures"),
            &["endpoint"],
        )
        .expect("valid metric");

        let tracked_wallets = Gauge::new("giantwatch_tracked_wallets", "Wallets under movement watch")
            .expect("valid metric");
        let wakeups = CounterVec::new(
            Opts::new("giantwatch_wakeups_total", "Tracked giants that moved"),
            &["severity"],
        )
        .expect("valid metric");
        let skipped_checks = Counter::new(
            "giantwatch_skipped_checks_total",
            "Movement checks skipped because the previous one was still running",
        )
        .expect("valid metric");

        let notifications = CounterVec::new(
            Opts::new("giantwatch_notifications_total", "Notification deliveries"),
            &["channel", "status"],
        )
        .expect("valid metric");
        let module_status = GaugeVec::new(
            Opts::new("giantwatch_module_running", "Module status"),
            &["module"],
        )
        .expect("valid metric");
        let uptime = Gauge::new("giantwatch_uptime_seconds", "Application uptime")
            .expect("valid metric");

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(detection_passes.clone()),
            Box::new(giants.clone()),
            Box::new(fetch_failures.clone()),
            Box::new(tracked_wallets.clone()),
            Box::new(wakeups.clone()),
            Box::new(skipped_checks.clone()),
            Box::new(notifications.clone()),
            Box::new(module_status.clone()),
            Box::new(uptime.clone()),
        ];
        for collector in collectors {
            if let Err(e) = registry.register(collector) {
                error!(target: "METRICS", "Failed to register metric: {}", e);
            }
        }

        info!(target: "METRICS", "Prometheus metrics initialized");

        Self {
            registry,
            start_time: Instant::now(),
            detection_passes,
            giants,
            fetch_failures,
            tracked_wallets,
            wakeups,
            skipped_checks,
            notifications,
            module_status,
            uptime,
        }
    }

    /// Set module status
    pub fn set_module_status(&self, module: &str, running: bool) {
        self.module_status
            .with_label_values(&[module])
            .set(if running { 1.0 } else { 0.0 });
    }

    /// Get metrics as Prometheus text format
    pub fn get_metrics(&self) -> String {
        self.uptime.set(self.start_time.elapsed().as_secs_f64());

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(target: "METRICS", "Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}
