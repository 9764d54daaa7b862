use crate::compute::{CacheStats, Source, TraceEntry};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryReport {
    pub stats: CacheStats,
    /// Share of cache lookups answered without computing.
    pub hit_rate: f64,
    /// Formula runs per variable, from the computation log.
    pub formula_runs: HashMap<String, usize>,
    /// Deepest nesting seen in the computation log.
    pub max_depth: usize,
}

impl TelemetryReport {
    pub fn analyze(stats: CacheStats, log: &[TraceEntry]) -> Self {
        let lookups = stats.hits + stats.misses;
        let mut formula_runs = HashMap::new();
        for entry in log {
            if let Source::Formula(_) = entry.source {
                *formula_runs.entry(entry.key.variable.clone()).or_insert(0) += 1;
            }
        }
        Self {
            stats,
            hit_rate: if lookups > 0 { stats.hits as f64 / lookups as f64 } else { 0.0 },
            formula_runs,
            max_depth: log.iter().map(|e| e.depth).max().unwrap_or(0),
        }
    }

    /// The `n` variables whose formulas ran most often, most frequent first.
    pub fn busiest(&self, n: usize) -> Vec<(&str, usize)> {
        let mut runs: Vec<(&str, usize)> = self.formula_runs.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        runs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        runs.truncate(n);
        runs
    }
}
