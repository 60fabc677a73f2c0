//! Per-run error accumulation
//!
//! Row failures never halt a batch. Each one is appended here with enough
//! context to reproduce against the source data, and surfaced as a
//! deduplicated summary at stage end.

use super::stage::Stage;
use std::collections::BTreeSet;

/// One recorded failure
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub identifier: String,
    pub stage: Stage,
    pub message: String,
}

/// Append-only failure list, lifetime = one pipeline run
#[derive(Debug, Default)]
pub struct ErrorCollector {
    records: Vec<ErrorRecord>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        stage: Stage,
        identifier: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.records.push(ErrorRecord {
            identifier: identifier.into(),
            stage,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Failures recorded for one stage
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    /// Deduplicated identifiers of a stage's failing rows
    pub fn failing_identifiers(&self, stage: Stage) -> BTreeSet<String> {
        self.for_stage(stage)
            .map(|r| r.identifier.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_deduplicates_identifiers() {
        let mut collector = ErrorCollector::new();
        collector.record(Stage::Neighbourhoods, "Sant Martí", "unknown district");
        collector.record(Stage::Neighbourhoods, "Sant Martí", "unknown district");
        collector.record(Stage::Neighbourhoods, "el Besòs", "malformed WKT");
        collector.record(Stage::Districts, "Eixample", "unrelated");

        let failing = collector.failing_identifiers(Stage::Neighbourhoods);
        assert_eq!(failing.len(), 2);
        assert!(failing.contains("Sant Martí"));
        assert_eq!(collector.len(), 4);
    }
}
