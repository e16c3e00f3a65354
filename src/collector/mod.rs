use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::kubernetes::{ApiClient, ApiError};
use crate::metrics::aggregate;
use crate::types::{NodeList, NodeSummary, PvcStats, VolumeRecord};

/// Name of a cluster node, as used to address its kubelet stats.
pub type NodeName = String;

/// Walks the cluster topology and collects PVC usage from every kubelet.
///
/// Failures never escape: a failed listing yields no nodes, and a failed
/// node yields no volumes while the remaining nodes are still collected.
#[derive(Debug, Clone)]
pub struct StatsCollector {
    client: ApiClient,
}

impl StatsCollector {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// List cluster nodes, or none when the listing fails.
    pub async fn list_nodes(&self, cancel: &CancellationToken) -> Vec<NodeName> {
        match self.client.get_json::<NodeList>(cancel, &["nodes"]).await {
            Ok(list) => list
                .items
                .into_iter()
                .filter_map(|node| node.metadata.name)
                .filter(|name| !name.is_empty())
                .collect(),
            Err(e) => {
                log_fetch_error(&e, None);
                Vec::new()
            }
        }
    }

    /// Volume stats for one node, or none when that node cannot be read.
    pub async fn fetch_node_volumes(&self, cancel: &CancellationToken, node: &str) -> Vec<VolumeRecord> {
        match self
            .client
            .get_json::<NodeSummary>(cancel, &["nodes", node, "proxy", "stats", "summary"])
            .await
        {
            Ok(summary) => summary.into_volumes(),
            Err(e) => {
                log_fetch_error(&e, Some(node));
                Vec::new()
            }
        }
    }

    /// PVC stats across all nodes, in node listing order.
    pub async fn fetch_all_pvc_stats(&self, cancel: &CancellationToken) -> Vec<PvcStats> {
        let mut stats = Vec::new();
        for node in self.list_nodes(cancel).await {
            let volumes = self.fetch_node_volumes(cancel, &node).await;
            let pvcs = aggregate(&volumes);
            debug!("node {}: {} volumes, {} PVCs", node, volumes.len(), pvcs.len());
            stats.extend(pvcs);
        }
        stats
    }
}

fn log_fetch_error(err: &ApiError, node: Option<&str>) {
    match (node, err.is_cancelled()) {
        (_, true) => debug!("{}", err),
        (Some(node), false) => error!("error getting stats for node {}: {}", node, err),
        (None, false) => error!("error listing nodes: {}", err),
    }
}
