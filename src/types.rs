use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub schedule: ScheduleConfig,
    pub secrets_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub api_timeout: Duration,
    pub annotations_path: PathBuf,
    pub annotations_prefix: String,
}

/// Timing of the scrape and reset loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub scrape_interval: Duration,
    pub reset_interval: Duration,
    pub debounce_delay: Duration,
}

/// Response of `GET /api/v1/nodes`. Only node names are used.
#[derive(Debug, Default, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
}

/// Response of `GET /api/v1/nodes/{name}/proxy/stats/summary`.
#[derive(Debug, Default, Deserialize)]
pub struct NodeSummary {
    #[serde(default)]
    pub pods: Vec<PodStats>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodStats {
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeRecord>,
}

impl NodeSummary {
    /// Flatten every pod's volumes into a single list, preserving order.
    pub fn into_volumes(self) -> Vec<VolumeRecord> {
        self.pods.into_iter().flat_map(|p| p.volumes).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub available_bytes: f64,
    #[serde(default)]
    pub capacity_bytes: f64,
    #[serde(default)]
    pub used_bytes: f64,
    #[serde(default)]
    pub inodes_free: f64,
    #[serde(default)]
    pub inodes: f64,
    #[serde(default)]
    pub inodes_used: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pvc_ref: Option<PvcRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PvcRef {
    pub name: String,
    pub namespace: String,
}

/// Usage of a single PVC as exported to the metric sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcStats {
    pub name: String,
    pub namespace: String,
    pub available_bytes: f64,
    pub capacity_bytes: f64,
    pub used_bytes: f64,
}

impl PvcStats {
    pub fn usage_percent(&self) -> f64 {
        if self.capacity_bytes <= 0.0 {
            return 0.0;
        }
        100.0 * self.used_bytes / self.capacity_bytes
    }

    pub fn avail_percent(&self) -> f64 {
        (100.0 - self.usage_percent()).clamp(0.0, 100.0)
    }
}

/// Operator-defined labels attached to every exported series.
/// Keys are already valid Prometheus label names and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLabels {
    pairs: Vec<(String, String)>,
}

impl StaticLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label, returning false when the key is reserved or already present.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> bool
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        if key == "name" || key == "namespace" || self.pairs.iter().any(|(k, _)| *k == key) {
            return false;
        }
        self.pairs.push((key, value.into()));
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
