use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::parsing::{parse_annotation_line, parse_duration, sanitize_label_name};
use crate::types::{Config, ScheduleConfig, StaticLabels};

const DEFAULT_BIND_ADDR: &str = ":9100";
const DEFAULT_SECRETS_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const DEFAULT_API_HOST: &str = "kubernetes.default";
const DEFAULT_ANNOTATIONS_PATH: &str = "/etc/podinfo/annotations";
const DEFAULT_ANNOTATIONS_PREFIX: &str = "k8s-pvc-usage/";

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let string_var = |key: &str, default: &str| {
        env.get_var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    let duration_var = |key: &str, default: Duration| -> Result<Duration> {
        match env.get_var(key) {
            Some(raw) if !raw.trim().is_empty() => {
                parse_duration(&raw).ok_or_else(|| anyhow!("Invalid {}: {:?}", key, raw))
            }
            _ => Ok(default),
        }
    };

    let schedule = ScheduleConfig {
        scrape_interval: duration_var("SCRAPE_INTERVAL", Duration::from_secs(15))?,
        reset_interval: duration_var("RESET_INTERVAL", Duration::from_secs(5 * 60))?,
        debounce_delay: duration_var("DEBOUNCE_DELAY", Duration::from_secs(1))?,
    };
    validate_schedule(&schedule)?;

    let api_port: u16 = string_var("KUBERNETES_PORT_443_TCP_PORT", "443")
        .parse()
        .context("Invalid KUBERNETES_PORT_443_TCP_PORT")?;
    let api_timeout = duration_var("API_REQUEST_TIMEOUT", Duration::from_secs(5))?;
    if api_timeout.is_zero() {
        bail!("API_REQUEST_TIMEOUT must be greater than zero");
    }

    Ok(Config {
        bind_addr: string_var("BIND_ADDR", DEFAULT_BIND_ADDR),
        schedule,
        secrets_path: PathBuf::from(string_var("KUBERNETES_SECRETS_PATH", DEFAULT_SECRETS_PATH)),
        api_host: string_var("KUBERNETES_SERVICE_HOST", DEFAULT_API_HOST),
        api_port,
        api_timeout,
        annotations_path: PathBuf::from(string_var("POD_ANNOTATION_PATH", DEFAULT_ANNOTATIONS_PATH)),
        // The prefix may legitimately be empty, so it is not trimmed to a default
        annotations_prefix: env
            .get_var("POD_ANNOTATION_PREFIX")
            .unwrap_or_else(|| DEFAULT_ANNOTATIONS_PREFIX.to_string()),
    })
}

fn validate_schedule(schedule: &ScheduleConfig) -> Result<()> {
    if schedule.scrape_interval.is_zero() {
        bail!("SCRAPE_INTERVAL must be greater than zero");
    }
    if schedule.debounce_delay.is_zero() {
        bail!("DEBOUNCE_DELAY must be greater than zero");
    }
    if schedule.reset_interval <= schedule.scrape_interval {
        bail!(
            "RESET_INTERVAL ({:?}) must be longer than SCRAPE_INTERVAL ({:?})",
            schedule.reset_interval,
            schedule.scrape_interval
        );
    }
    if schedule.debounce_delay >= schedule.scrape_interval {
        bail!(
            "DEBOUNCE_DELAY ({:?}) must be shorter than SCRAPE_INTERVAL ({:?})",
            schedule.debounce_delay,
            schedule.scrape_interval
        );
    }
    Ok(())
}

impl Config {
    /// Base URL of the core API group, e.g. `https://kubernetes.default:443/api/v1`.
    pub fn api_base_url(&self) -> String {
        let host = if self.api_host.contains(':') && !self.api_host.starts_with('[') {
            format!("[{}]", self.api_host)
        } else {
            self.api_host.clone()
        };
        format!("https://{}:{}/api/v1", host, self.api_port)
    }

    /// Address to bind the metrics listener to; `:9100` means every interface.
    pub fn listen_addr(&self) -> String {
        if self.bind_addr.starts_with(':') {
            format!("0.0.0.0{}", self.bind_addr)
        } else {
            self.bind_addr.clone()
        }
    }
}

/// Read the service-account bearer token from `<secrets_path>/token`.
pub fn load_token(secrets_path: &Path) -> Result<String> {
    let path = secrets_path.join("token");
    let token = std::fs::read_to_string(&path)
        .with_context(|| format!("unable to read API token from {}", path.display()))?;
    let token = token.trim();
    if token.is_empty() {
        bail!("API token at {} is empty", path.display());
    }
    Ok(token.to_string())
}

/// Load the static labels attached to every series from the annotations file.
/// A missing or unreadable file yields no labels.
pub fn load_static_labels(path: &Path, prefix: &str) -> StaticLabels {
    let mut labels = StaticLabels::new();
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to read annotations from {}: {}", path.display(), e);
            return labels;
        }
    };

    for line in contents.lines() {
        let Some((key, value)) = parse_annotation_line(line, prefix) else {
            debug!("skipping annotation: {}", line);
            continue;
        };
        let Some(label) = sanitize_label_name(&key) else {
            warn!("dropping annotation with unusable label name {:?}", key);
            continue;
        };
        if label != key {
            debug!("annotation key {:?} exported as label {:?}", key, label);
        }
        if !labels.insert(label.clone(), value) {
            warn!("dropping duplicate or reserved label {:?}", label);
        }
    }

    info!(
        "using custom labels {:?} with values {:?}",
        labels.keys().collect::<Vec<_>>(),
        labels.values().collect::<Vec<_>>()
    );
    labels
}
