use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::debounce::{sleep_until_deadline, Debouncer};
use super::{PvcStatsSource, RefreshReceiver};
use crate::metrics::MetricSink;
use crate::types::ScheduleConfig;

/// Periodically collects PVC stats and writes them into the sink.
///
/// Ticks and refresh requests only arm the debouncer; the scrape itself runs
/// once the debounce window has passed quietly.
pub struct ScrapeScheduler<S> {
    source: S,
    sink: Arc<MetricSink>,
    interval: Duration,
    debouncer: Debouncer,
    refresh: RefreshReceiver,
}

impl<S: PvcStatsSource> ScrapeScheduler<S> {
    pub fn new(source: S, sink: Arc<MetricSink>, schedule: &ScheduleConfig, refresh: RefreshReceiver) -> Self {
        Self {
            source,
            sink,
            interval: schedule.scrape_interval,
            debouncer: Debouncer::new(schedule.debounce_delay),
            refresh,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("exiting scrape loop");
                    return;
                }
                _ = ticker.tick() => {
                    self.debouncer.trigger(Instant::now());
                }
                Some(()) = self.refresh.recv() => {
                    info!("refresh requested");
                    ticker.reset();
                    self.debouncer.trigger(Instant::now());
                }
                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    if self.debouncer.fire(Instant::now()) {
                        self.scrape(&cancel).await;
                    }
                }
            }
        }
    }

    /// Fetch outside the sink lock, then write the whole batch under it.
    pub async fn scrape(&self, cancel: &CancellationToken) -> usize {
        debug!("scraping stats");
        let stats = self.source.pvc_stats(cancel).await;
        let count = self.sink.publish(&stats).await;
        info!("scraped metrics for {} PVCs", count);
        count
    }
}
