// PVC aggregation and the gauge state it is exported through
pub mod aggregate;
pub mod sink;

// Re-export commonly used items
pub use aggregate::aggregate;
pub use sink::MetricSink;
