//! Periodic background tasks with guaranteed cancellation

use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

/// A task that runs `tick` on a fixed interval until stopped.
///
/// Dropping the handle aborts the task, so every exit path of the owner
/// cancels it. The first tick fires one full period after spawning.
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() completes its first tick immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        info!(target: "SCHEDULER", "{} scheduled every {:?}", name, period);
        Self { name, handle }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
        info!(target: "SCHEDULER", "{} cancelled", self.name);
    }
}
