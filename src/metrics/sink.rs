use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::Mutex;
use tracing::warn;

use crate::types::{PvcStats, StaticLabels};

const METRIC_NAMESPACE: &str = "k8s_pvc";

/// The four PVC gauge families and the registry they are exported from.
struct PvcGauges {
    registry: Registry,
    avail_percent: GaugeVec,
    avail_bytes: GaugeVec,
    usage_percent: GaugeVec,
    usage_bytes: GaugeVec,
}

impl PvcGauges {
    fn all(&self) -> [&GaugeVec; 4] {
        [&self.avail_percent, &self.avail_bytes, &self.usage_percent, &self.usage_bytes]
    }
}

/// Shared gauge state for PVC usage.
///
/// Every write, clear and read goes through one lock, so a scrape of the
/// exposition never sees a partially written or partially cleared cycle.
pub struct MetricSink {
    gauges: Mutex<PvcGauges>,
    static_labels: StaticLabels,
}

impl MetricSink {
    pub fn new(static_labels: StaticLabels) -> Result<Self, prometheus::Error> {
        let mut label_names = vec!["name", "namespace"];
        label_names.extend(static_labels.keys());

        let registry = Registry::new();
        let gauge = |name: &str, help: &str| -> Result<GaugeVec, prometheus::Error> {
            let vec = GaugeVec::new(Opts::new(name, help).namespace(METRIC_NAMESPACE), &label_names)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let avail_percent = gauge("avail_percent", "Percentage of PVC available")?;
        let avail_bytes = gauge("avail_bytes", "Amount of PVC available in bytes")?;
        let usage_percent = gauge("usage_percent", "Percentage of PVC used")?;
        let usage_bytes = gauge("usage_bytes", "Amount of PVC used in bytes")?;

        Ok(Self {
            gauges: Mutex::new(PvcGauges {
                registry,
                avail_percent,
                avail_bytes,
                usage_percent,
                usage_bytes,
            }),
            static_labels,
        })
    }

    pub fn static_labels(&self) -> &StaticLabels {
        &self.static_labels
    }

    /// Overwrite the gauges for every PVC in `stats`. Returns how many were written.
    pub async fn publish(&self, stats: &[PvcStats]) -> usize {
        let gauges = self.gauges.lock().await;
        let mut written = 0;

        for pvc in stats {
            let mut values = vec![pvc.name.as_str(), pvc.namespace.as_str()];
            values.extend(self.static_labels.values());

            let series = (
                gauges.avail_percent.get_metric_with_label_values(&values),
                gauges.avail_bytes.get_metric_with_label_values(&values),
                gauges.usage_percent.get_metric_with_label_values(&values),
                gauges.usage_bytes.get_metric_with_label_values(&values),
            );
            match series {
                (Ok(avail_pct), Ok(avail_bytes), Ok(usage_pct), Ok(usage_bytes)) => {
                    avail_pct.set(pvc.avail_percent());
                    avail_bytes.set(pvc.available_bytes);
                    usage_pct.set(pvc.usage_percent());
                    usage_bytes.set(pvc.used_bytes);
                    written += 1;
                }
                _ => warn!("skipping PVC {}/{}: label mismatch", pvc.namespace, pvc.name),
            }
        }
        written
    }

    /// Drop every series so deleted PVCs stop being reported.
    pub async fn clear(&self) {
        let gauges = self.gauges.lock().await;
        for vec in gauges.all() {
            vec.reset();
        }
    }

    /// Render the current gauges in the Prometheus text exposition format.
    pub async fn render(&self) -> Result<String, prometheus::Error> {
        let gauges = self.gauges.lock().await;
        let families = gauges.registry.gather();
        drop(gauges);

        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Number of series across all four families.
    pub async fn series_count(&self) -> usize {
        let gauges = self.gauges.lock().await;
        gauges
            .registry
            .gather()
            .iter()
            .map(|family| family.get_metric().len())
            .sum()
    }
}
