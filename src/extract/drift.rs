use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use super::boundary::TableScan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftRecord {
    pub table: String,
    pub declared_page: u32,
    pub expected_page: i64,
    pub actual_page: usize,
    pub drift: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub total_tables: usize,
    pub located_tables: usize,
    pub not_found_tables: Vec<String>,
    pub skipped_tables: usize,
    pub tables_with_drift: usize,
    pub ambiguous_tables: usize,
    pub distribution: BTreeMap<i64, usize>,
    pub drifted: Vec<DriftRecord>,
}

impl DriftReport {
    pub fn from_scans(scans: &[TableScan]) -> Self {
        let mut report = Self {
            total_tables: scans.len(),
            ..Self::default()
        };

        for scan in scans {
            if scan.skipped {
                report.skipped_tables += 1;
                continue;
            }
            if scan.ambiguous_candidates > 0 {
                report.ambiguous_tables += 1;
            }
            let (Some(actual_page), Some(drift)) = (scan.actual_page, scan.drift) else {
                report.not_found_tables.push(scan.table.clone());
                continue;
            };

            report.located_tables += 1;
            *report.distribution.entry(drift).or_insert(0) += 1;
            if drift != 0 {
                report.tables_with_drift += 1;
                report.drifted.push(DriftRecord {
                    table: scan.table.clone(),
                    declared_page: scan.declared_page,
                    expected_page: scan.expected_page,
                    actual_page,
                    drift,
                });
            }
        }

        report.drifted.sort_by(|left, right| {
            right
                .drift
                .unsigned_abs()
                .cmp(&left.drift.unsigned_abs())
                .then_with(|| left.table.cmp(&right.table))
        });
        report
    }

    pub fn log_summary(&self, top: usize) {
        info!(
            total = self.total_tables,
            located = self.located_tables,
            not_found = self.not_found_tables.len(),
            skipped = self.skipped_tables,
            drifted = self.tables_with_drift,
            ambiguous = self.ambiguous_tables,
            "page drift summary"
        );
        for (drift, count) in &self.distribution {
            info!(drift = *drift, tables = *count, "drift distribution");
        }
        for record in self.drifted.iter().take(top) {
            info!(
                table = %record.table,
                declared_page = record.declared_page,
                actual_page = record.actual_page,
                drift = record.drift,
                "drifted table"
            );
        }
        if !self.not_found_tables.is_empty() {
            warn!(
                tables = ?self.not_found_tables,
                "tables listed in the table of contents were not located"
            );
        }
    }
}
