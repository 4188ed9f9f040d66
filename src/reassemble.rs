//! Record reassembly.
//!
//! Holding names often wrap over several physical rows with the financial
//! values printed only on the last one. Rows are first projected through
//! the column schema, then name fragments without financial values are
//! accumulated and attached to the next row that has them.

use serde::{Deserialize, Serialize};

use crate::config::ColumnRole;
use crate::error::RowError;
use crate::model::{RawRecord, RawRow};

/// Output of [`RecordReassembler::reassemble`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reassembled {
    /// One record per logical holding
    pub records: Vec<RawRecord>,
    /// Name fragments left without a financial row at the end of the region
    pub orphans: Vec<String>,
}

/// Projects rows through a column schema and joins wrapped names.
#[derive(Debug, Clone)]
pub struct RecordReassembler {
    columns: Vec<ColumnRole>,
}

impl RecordReassembler {
    /// Create a reassembler for a one-panel schema.
    pub fn new(columns: Vec<ColumnRole>) -> Self {
        Self { columns }
    }

    /// Map a raw row's cells to record fields.
    ///
    /// Rows tagged during extraction, or whose width differs from the
    /// schema, are rejected.
    pub fn project(&self, row: &RawRow) -> Result<RawRecord, RowError> {
        if row.geometry_mismatch || row.cells.len() != self.columns.len() {
            return Err(RowError::GeometryMismatch {
                page: row.page,
                row: row.index,
                expected: self.columns.len(),
                found: row.cells.len(),
            });
        }

        let mut record = RawRecord {
            page: row.page,
            ..Default::default()
        };
        for (role, cell) in self.columns.iter().zip(&row.cells) {
            let cell = cell.trim().to_string();
            match role {
                ColumnRole::HoldingName => record.holding_name = cell,
                ColumnRole::Currency => record.currency = cell,
                ColumnRole::MarketValue => record.market_value = cell,
                ColumnRole::NetAssets => record.net_assets = cell,
                ColumnRole::Ignore => {}
            }
        }
        Ok(record)
    }

    /// Join name-only rows onto the next row carrying financial values.
    pub fn reassemble<I>(&self, rows: I) -> Reassembled
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut out = Reassembled::default();
        let mut fragments: Vec<String> = Vec::new();

        for row in rows {
            let name = row.holding_name.trim();
            if !row.has_financials() {
                if !name.is_empty() {
                    fragments.push(name.to_string());
                }
                continue;
            }

            if !name.is_empty() {
                fragments.push(name.to_string());
            }
            out.records.push(RawRecord {
                holding_name: fragments.join(" "),
                ..row
            });
            fragments.clear();
        }

        if !fragments.is_empty() {
            log::warn!(
                "discarding {} orphan name fragments: {:?}",
                fragments.len(),
                fragments
            );
            out.orphans = fragments;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ColumnRole> {
        vec![
            ColumnRole::HoldingName,
            ColumnRole::Currency,
            ColumnRole::MarketValue,
            ColumnRole::NetAssets,
        ]
    }

    fn row(cells: [&str; 4]) -> RawRecord {
        RawRecord {
            holding_name: cells[0].into(),
            currency: cells[1].into(),
            market_value: cells[2].into(),
            net_assets: cells[3].into(),
            page: 1,
        }
    }

    #[test]
    fn test_wrapped_name_joined() {
        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Acme Corp", "", "", ""]),
            row(["Holdings Ltd", "EUR", "1.234,56", "0,5"]),
        ]);

        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.holding_name, "Acme Corp Holdings Ltd");
        assert_eq!(record.currency, "EUR");
        assert_eq!(record.market_value, "1.234,56");
        assert_eq!(record.net_assets, "0,5");
        assert!(out.orphans.is_empty());
    }

    #[test]
    fn test_wrapped_name_normalizes_to_typed_record() {
        use crate::config::{ExtractionConfig, TableConfig};
        use crate::model::DocumentId;
        use crate::normalize::FieldNormalizer;

        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Acme Corp", "", "", ""]),
            row(["Holdings Ltd", "USD", "100", "5"]),
        ]);

        let config = ExtractionConfig::new("test", TableConfig::new(vec![200.0, 300.0, 400.0], schema()));
        let normalized = FieldNormalizer::new(&config).normalize(out.records, &DocumentId::new("report.pdf"), None);
        assert!(normalized.errors.is_empty());
        assert_eq!(normalized.records.len(), 1);
        let record = &normalized.records[0];
        assert_eq!(record.holding_name, "Acme Corp Holdings Ltd");
        assert_eq!(record.currency, "USD");
        assert_eq!(record.market_value, 100.0);
        assert_eq!(record.net_assets, 5.0);
    }

    #[test]
    fn test_complete_rows_pass_through() {
        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Acme", "EUR", "1", "0,1"]),
            row(["Beta", "USD", "2", "0,2"]),
        ]);
        let names: Vec<&str> = out.records.iter().map(|r| r.holding_name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Beta"]);
    }

    #[test]
    fn test_three_line_name_and_blank_rows() {
        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Very Long", "", "", ""]),
            row(["", "", "", ""]),
            row(["Company", "", "", ""]),
            row(["Name SA", "", "100", "1,0"]),
        ]);
        assert_eq!(out.records[0].holding_name, "Very Long Company Name SA");
        assert_eq!(out.records[0].currency, "");
    }

    #[test]
    fn test_financial_row_without_name() {
        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Acme Corp", "", "", ""]),
            row(["", "EUR", "10", "0,1"]),
        ]);
        assert_eq!(out.records[0].holding_name, "Acme Corp");
    }

    #[test]
    fn test_orphans_reported() {
        let reassembler = RecordReassembler::new(schema());
        let out = reassembler.reassemble(vec![
            row(["Acme", "EUR", "1", "0,1"]),
            row(["Dangling", "", "", ""]),
        ]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.orphans, vec!["Dangling"]);
    }

    #[test]
    fn test_project() {
        let reassembler = RecordReassembler::new(vec![
            ColumnRole::HoldingName,
            ColumnRole::Ignore,
            ColumnRole::Currency,
            ColumnRole::MarketValue,
            ColumnRole::NetAssets,
        ]);
        let raw = RawRow::new(
            vec![" Acme ".into(), "1 000".into(), "EUR".into(), "10".into(), "0,1".into()],
            4,
            0,
        );
        let record = reassembler.project(&raw).unwrap();
        assert_eq!(record.holding_name, "Acme");
        assert_eq!(record.currency, "EUR");
        assert_eq!(record.page, 4);
    }

    #[test]
    fn test_project_mismatch() {
        let reassembler = RecordReassembler::new(schema());
        let raw = RawRow::new(vec!["Acme".into(), "EUR".into()], 2, 7);
        assert_eq!(
            reassembler.project(&raw),
            Err(RowError::GeometryMismatch {
                page: 2,
                row: 7,
                expected: 4,
                found: 2
            })
        );
    }
}
