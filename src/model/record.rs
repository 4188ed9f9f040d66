//! Holding records and the finished holdings table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{DocumentId, TableStats};

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Source document
    pub document_id: DocumentId,
    /// 1-indexed page the record's financial row was read from
    pub page: u32,
}

/// A logical record after reassembly: still text, one per holding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub holding_name: String,
    pub currency: String,
    pub market_value: String,
    pub net_assets: String,
    /// Page of the row that carried the financial values
    pub page: u32,
}

impl RawRecord {
    /// Check if the record has any financial value.
    pub fn has_financials(&self) -> bool {
        !self.currency.trim().is_empty()
            || !self.market_value.trim().is_empty()
            || !self.net_assets.trim().is_empty()
    }
}

/// A normalized holding.
///
/// Both numbers are finite. The currency is a recognized code or alias, or
/// empty on structural aggregate rows only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub holding_name: String,
    pub currency: String,
    pub market_value: f64,
    pub net_assets: f64,
    pub provenance: Provenance,
}

impl CanonicalRecord {
    /// Key under which two records count as byte-identical on the same page.
    fn identity(&self) -> (&str, &str, u64, u64, u32) {
        (
            &self.holding_name,
            &self.currency,
            self.market_value.to_bits(),
            self.net_assets.to_bits(),
            self.provenance.page,
        )
    }
}

/// The fund a table is requested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundRequest {
    /// Fund name as printed in the report
    pub fund_name_report: String,
    /// Fund name as listed on the provider's website, when known
    pub fund_name_website: Option<String>,
    /// ISIN of the share class the report was fetched for
    #[serde(default)]
    pub isin: Option<String>,
}

impl FundRequest {
    /// Create a request for a report fund name.
    pub fn new(fund_name_report: impl Into<String>) -> Self {
        Self {
            fund_name_report: fund_name_report.into(),
            fund_name_website: None,
            isin: None,
        }
    }

    /// Set the website fund name.
    pub fn with_website_name(mut self, name: impl Into<String>) -> Self {
        self.fund_name_website = Some(name.into());
        self
    }

    /// Set the ISIN carried into the table's fund information.
    pub fn with_isin(mut self, isin: impl Into<String>) -> Self {
        self.isin = Some(isin.into().trim().to_uppercase());
        self
    }
}

/// Identification of the fund a table belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundInfo {
    pub fund_name_report: String,
    pub fund_name_website: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
    pub source_document_id: DocumentId,
}

impl FundInfo {
    /// Fund information for a request answered from a document.
    pub fn from_request(request: &FundRequest, source_document_id: DocumentId) -> Self {
        Self {
            fund_name_report: request.fund_name_report.clone(),
            fund_name_website: request.fund_name_website.clone(),
            isin: request.isin.clone(),
            source_document_id,
        }
    }
}

/// The holdings of one fund in one report.
///
/// Contains no two byte-identical records from the same page. The table is
/// read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsTable {
    fund: FundInfo,
    records: Vec<CanonicalRecord>,
    stats: TableStats,
}

impl HoldingsTable {
    /// Build a table, removing byte-identical duplicates (first one kept).
    pub fn new(fund: FundInfo, records: Vec<CanonicalRecord>, mut stats: TableStats) -> Self {
        let keep: Vec<bool> = {
            let mut seen = HashSet::with_capacity(records.len());
            records.iter().map(|r| seen.insert(r.identity())).collect()
        };

        let duplicates = keep.iter().filter(|k| !**k).count();
        stats.duplicates_removed += duplicates;
        if duplicates > 0 {
            log::debug!(
                "{}: removed {} duplicate records",
                fund.fund_name_report,
                duplicates
            );
        }

        let records: Vec<CanonicalRecord> = records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, keep)| keep.then_some(record))
            .collect();
        stats.records_emitted = records.len();

        Self {
            fund,
            records,
            stats,
        }
    }

    /// Fund identification.
    pub fn fund(&self) -> &FundInfo {
        &self.fund
    }

    /// Records in document order.
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Row counters for this table.
    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of the net-assets percentages.
    pub fn total_net_assets(&self) -> f64 {
        self.records.iter().map(|r| r.net_assets).sum()
    }

    /// Sum of the market values.
    pub fn total_market_value(&self) -> f64 {
        self.records.iter().map(|r| r.market_value).sum()
    }

    /// Serialize the table to pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Take the records out of the table.
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, value: f64, page: u32) -> CanonicalRecord {
        CanonicalRecord {
            holding_name: name.to_string(),
            currency: "EUR".to_string(),
            market_value: value,
            net_assets: 1.5,
            provenance: Provenance {
                document_id: DocumentId::new("report.pdf"),
                page,
            },
        }
    }

    fn fund() -> FundInfo {
        FundInfo::from_request(
            &FundRequest::new("Fund Alpha").with_isin(" lu0123456789 "),
            DocumentId::new("report.pdf"),
        )
    }

    #[test]
    fn test_duplicates_removed_per_page() {
        let records = vec![
            record("Acme", 100.0, 13),
            record("Acme", 100.0, 13),
            record("Acme", 100.0, 14),
            record("Beta", 100.0, 13),
        ];
        let table = HoldingsTable::new(fund(), records, TableStats::default());

        assert_eq!(table.len(), 3);
        assert_eq!(table.stats().duplicates_removed, 1);
        assert_eq!(table.stats().records_emitted, 3);
        assert_eq!(table.records()[0].holding_name, "Acme");
        assert_eq!(table.records()[2].holding_name, "Beta");
    }

    #[test]
    fn test_totals() {
        let records = vec![record("Acme", 100.0, 13), record("Beta", 50.0, 13)];
        let table = HoldingsTable::new(fund(), records, TableStats::default());
        assert_eq!(table.total_market_value(), 150.0);
        assert_eq!(table.total_net_assets(), 3.0);
    }

    #[test]
    fn test_json_serialization() {
        let table = HoldingsTable::new(fund(), vec![record("Acme", 1.0, 2)], TableStats::default());
        let json = table.to_json().unwrap();
        assert!(json.contains("\"holding_name\": \"Acme\""));
        assert!(json.contains("\"document_id\": \"report.pdf\""));
        assert!(json.contains("\"isin\": \"LU0123456789\""));
    }

    #[test]
    fn test_request_without_isin_deserializes() {
        let request: FundRequest =
            serde_json::from_str(r#"{"fund_name_report": "Fund Alpha", "fund_name_website": null}"#).unwrap();
        assert_eq!(request.isin, None);
        assert_eq!(FundInfo::from_request(&request, DocumentId::new("r.pdf")).isin, None);
    }

    #[test]
    fn test_raw_record_has_financials() {
        let mut raw = RawRecord {
            holding_name: "Acme".into(),
            ..Default::default()
        };
        assert!(!raw.has_financials());
        raw.net_assets = "0,5".into();
        assert!(raw.has_financials());
    }
}
