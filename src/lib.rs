// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod kubernetes;
pub mod metrics;
pub mod collector;
pub mod scheduler;
pub mod server;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, load_static_labels, load_token, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_annotation_line, parse_duration, sanitize_label_name};
pub use kubernetes::{ApiClient, ApiClientBuilder, ApiError, TlsTrust};
pub use metrics::{aggregate, MetricSink};
pub use collector::StatsCollector;
pub use scheduler::{refresh_channel, PvcStatsSource, RefreshTrigger, ResetScheduler, ScrapeScheduler, Schedulers};
