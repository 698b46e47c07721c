//! Offline check of a rule book against the expert labels in the registry.

use serde::Serialize;
use tracing::info;

use std::fmt;
use std::path::Path;

use crate::classify::{FactRecord, RuleBook};
use crate::code::NormalizedCode;
use crate::error::Result;
use crate::registry::Registry;

/// Label rows of the confusion matrix.
pub const LABELS: [u8; 3] = [1, 2, 4];
/// Prediction columns; the last one is "no tier".
pub const PREDICTIONS: [Option<u8>; 4] = [Some(1), Some(2), Some(4), None];

#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub code: NormalizedCode,
    pub name: Option<String>,
    pub adi: Option<String>,
    pub status: Option<String>,
    pub label: u8,
    pub predicted: Option<u8>,
    pub rule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub tier: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub evaluated: usize,
    /// Rows without a usable label.
    pub skipped: usize,
    pub matches: usize,
    /// `confusion[label][prediction]`, indexed by [`LABELS`] and [`PREDICTIONS`].
    pub confusion: [[usize; 4]; 3],
    pub mismatches: Vec<Mismatch>,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        ratio(self.matches, self.evaluated)
    }

    pub fn metrics(&self) -> Vec<ClassMetrics> {
        LABELS
            .iter()
            .enumerate()
            .map(|(row, tier)| {
                let hits = self.confusion[row][row];
                let predicted: usize = self.confusion.iter().map(|r| r[row]).sum();
                let support: usize = self.confusion[row].iter().sum();
                let precision = ratio(hits, predicted);
                let recall = ratio(hits, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics { tier: *tier, precision, recall, f1, support }
            })
            .collect()
    }

    /// Writes the mismatches as CSV.
    pub fn write_mismatches(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for mismatch in &self.mismatches {
            writer.serialize(mismatch)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        info!(path = %path.as_ref().display(), rows = self.mismatches.len(), "mismatches exported");
        Ok(())
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

/// Classifies every labelled registry row with `rules` and compares.
pub fn evaluate(registry: &Registry, rules: &RuleBook) -> EvaluationReport {
    let mut report = EvaluationReport {
        evaluated: 0,
        skipped: 0,
        matches: 0,
        confusion: [[0; 4]; 3],
        mismatches: Vec::new(),
    };
    for entry in registry.entries() {
        let Some(label) = entry.risk_label() else {
            report.skipped += 1;
            continue;
        };
        let outcome = rules.classify(&FactRecord::from_entry(entry));
        let predicted = outcome.risk.map(|tier| tier.value());
        let row = LABELS.iter().position(|l| *l == label).unwrap_or_default();
        let column = PREDICTIONS.iter().position(|p| *p == predicted).unwrap_or(PREDICTIONS.len() - 1);
        report.confusion[row][column] += 1;
        report.evaluated += 1;
        if predicted == Some(label) {
            report.matches += 1;
        } else {
            report.mismatches.push(Mismatch {
                code: entry.code.clone(),
                name: entry.name.clone(),
                adi: entry.adi.clone(),
                status: entry.status.clone(),
                label,
                predicted,
                rule: outcome.rule,
            });
        }
    }
    info!(
        evaluated = report.evaluated,
        skipped = report.skipped,
        matches = report.matches,
        "rule book evaluated"
    );
    report
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:>6} {:>9} {:>9} {:>9} {:>8}", "tier", "precision", "recall", "f1", "support")?;
        for m in self.metrics() {
            writeln!(
                f,
                "{:>6} {:>9.3} {:>9.3} {:>9.3} {:>8}",
                m.tier, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f, "\naccuracy {:.3} over {} rows ({} unlabelled)", self.accuracy(), self.evaluated, self.skipped)?;
        writeln!(f, "\nlabel \\ predicted      1      2      4   none")?;
        for (label, row) in LABELS.iter().zip(self.confusion.iter()) {
            writeln!(f, "{:>17} {:>6} {:>6} {:>6} {:>6}", label, row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CanonicalRegistryEntry;

    fn entry(code: &str, adi: Option<&str>, status: Option<&str>, level: Option<&str>) -> CanonicalRegistryEntry {
        let mut entry = CanonicalRegistryEntry::new(NormalizedCode::parse(code).unwrap());
        entry.adi = adi.map(str::to_string);
        entry.status = status.map(str::to_string);
        entry.level = level.map(str::to_string);
        entry
    }

    #[test]
    fn counts_matches_per_tier() {
        let registry = Registry::from_entries([
            entry("E123", Some("0-0.15"), Some("1"), Some("4")),
            entry("E330", None, Some("0"), Some("1")),
            entry("E211", Some("0-5"), Some("0"), Some("2")),
            entry("E952", Some("updating"), None, Some("2")),
            entry("E100", Some("0-3"), None, Some("1")),
            entry("E150d", None, None, Some("-1")),
        ])
        .unwrap();
        let report = evaluate(&registry, &RuleBook::standard());
        assert_eq!((report.evaluated, report.skipped, report.matches), (5, 1, 3));
        // rows are labels 1, 2, 4
        assert_eq!(report.confusion, [[1, 1, 0, 0], [0, 1, 0, 1], [0, 0, 1, 0]]);
        let tier_two = &report.metrics()[1];
        assert_eq!(tier_two.support, 2);
        assert_eq!(tier_two.precision, 0.5);
        assert_eq!(report.mismatches.len(), 2);
    }
}
