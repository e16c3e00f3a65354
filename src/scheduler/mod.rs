// Scrape and reset loops sharing one metric sink
pub mod debounce;
pub mod reset;
pub mod scrape;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::collector::StatsCollector;
use crate::metrics::MetricSink;
use crate::types::{PvcStats, ScheduleConfig};

pub use debounce::{DebounceState, Debouncer};
pub use reset::ResetScheduler;
pub use scrape::ScrapeScheduler;

/// Where the scrape loop gets its PVC stats from.
pub trait PvcStatsSource: Send + Sync + 'static {
    fn pvc_stats(&self, cancel: &CancellationToken) -> impl Future<Output = Vec<PvcStats>> + Send;
}

impl PvcStatsSource for StatsCollector {
    async fn pvc_stats(&self, cancel: &CancellationToken) -> Vec<PvcStats> {
        self.fetch_all_pvc_stats(cancel).await
    }
}

/// Receiving side of the refresh channel, owned by the scrape loop.
pub type RefreshReceiver = mpsc::Receiver<()>;

/// Requests an immediate scrape. At most one request is ever outstanding.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
}

impl RefreshTrigger {
    /// Never blocks. Returns false when a refresh was already pending or the
    /// scrape loop is gone.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("refresh already pending");
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!("scrape loop stopped; dropping refresh");
                false
            }
        }
    }
}

pub fn refresh_channel() -> (RefreshTrigger, RefreshReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (RefreshTrigger { tx }, rx)
}

/// Handles of the two running loops.
pub struct Schedulers {
    scrape: JoinHandle<()>,
    reset: JoinHandle<()>,
}

impl Schedulers {
    /// Wait for both loops to exit (after the cancellation token fires).
    pub async fn join(self) {
        if let Err(e) = self.scrape.await {
            error!("scrape loop failed: {}", e);
        }
        if let Err(e) = self.reset.await {
            error!("reset loop failed: {}", e);
        }
    }
}

/// Start the scrape and reset loops on the current runtime.
pub fn spawn<S: PvcStatsSource>(
    source: S,
    sink: Arc<MetricSink>,
    schedule: &ScheduleConfig,
    cancel: CancellationToken,
) -> Schedulers {
    let (trigger, refresh) = refresh_channel();
    let scraper = ScrapeScheduler::new(source, sink.clone(), schedule, refresh);
    let resetter = ResetScheduler::new(sink, schedule.reset_interval, trigger);

    Schedulers {
        scrape: tokio::spawn(scraper.run(cancel.clone())),
        reset: tokio::spawn(resetter.run(cancel)),
    }
}
