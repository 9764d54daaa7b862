//! Read-only diagnostics over a resolver's cache and computation log.
pub mod telemetry;
pub mod topology;

pub use telemetry::TelemetryReport;
pub use topology::DependencyGraph;
