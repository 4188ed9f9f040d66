//! Per-table row counters.

use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// Counters describing what happened to the rows of one table.
///
/// Every dropped row lands in exactly one counter, so the totals can be
/// reconciled against `rows_extracted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Rows read from the grid (blank rows excluded)
    pub rows_extracted: usize,
    /// Rows whose cell count disagreed with the schema
    pub geometry_mismatches: usize,
    /// Rows dropped by the noise screen before reassembly
    pub noise_rows: usize,
    /// Name fragments left unattached at the end of the region
    pub orphan_fragments: usize,
    /// Records dropped for unreadable numbers
    pub numeric_errors: usize,
    /// Records dropped for unknown or missing currency
    pub currency_errors: usize,
    /// Records dropped for corrupted holding names
    pub corrupted_names: usize,
    /// Byte-identical records removed
    pub duplicates_removed: usize,
    /// Records in the final table
    pub records_emitted: usize,
}

impl TableStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a row-level error under its category.
    pub fn record_error(&mut self, err: &RowError) {
        match err {
            RowError::GeometryMismatch { .. } => self.geometry_mismatches += 1,
            RowError::NumericParse { .. } => self.numeric_errors += 1,
            RowError::UnrecognizedCurrency(_) | RowError::MissingCurrency(_) => {
                self.currency_errors += 1
            }
        }
    }

    /// Total records dropped after reassembly.
    pub fn records_dropped(&self) -> usize {
        self.numeric_errors + self.currency_errors + self.corrupted_names + self.duplicates_removed
    }

    /// Add another table's counters to these.
    pub fn merge(&mut self, other: &TableStats) {
        self.rows_extracted += other.rows_extracted;
        self.geometry_mismatches += other.geometry_mismatches;
        self.noise_rows += other.noise_rows;
        self.orphan_fragments += other.orphan_fragments;
        self.numeric_errors += other.numeric_errors;
        self.currency_errors += other.currency_errors;
        self.corrupted_names += other.corrupted_names;
        self.duplicates_removed += other.duplicates_removed;
        self.records_emitted += other.records_emitted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NumericField;

    #[test]
    fn test_record_error_categories() {
        let mut stats = TableStats::new();
        stats.record_error(&RowError::NumericParse {
            field: NumericField::MarketValue,
            value: "n/a".into(),
        });
        stats.record_error(&RowError::UnrecognizedCurrency("XYZ".into()));
        stats.record_error(&RowError::MissingCurrency("Acme".into()));

        assert_eq!(stats.numeric_errors, 1);
        assert_eq!(stats.currency_errors, 2);
        assert_eq!(stats.records_dropped(), 3);
    }

    #[test]
    fn test_merge() {
        let mut a = TableStats {
            rows_extracted: 10,
            records_emitted: 8,
            ..Default::default()
        };
        let b = TableStats {
            rows_extracted: 5,
            noise_rows: 1,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.rows_extracted, 15);
        assert_eq!(a.noise_rows, 1);
        assert_eq!(a.records_emitted, 8);
    }
}
