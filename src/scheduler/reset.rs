use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::RefreshTrigger;
use crate::metrics::MetricSink;

/// Periodically wipes the sink so series of deleted PVCs disappear, then asks
/// the scrape loop to repopulate it straight away.
pub struct ResetScheduler {
    sink: Arc<MetricSink>,
    interval: Duration,
    refresh: RefreshTrigger,
}

impl ResetScheduler {
    pub fn new(sink: Arc<MetricSink>, interval: Duration, refresh: RefreshTrigger) -> Self {
        Self {
            sink,
            interval,
            refresh,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        // First reset one full interval after start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("exiting reset loop");
                    return;
                }
                _ = ticker.tick() => self.reset().await,
            }
        }
    }

    pub async fn reset(&self) {
        info!("resetting stats");
        self.sink.clear().await;
        self.refresh.request();
    }
}
