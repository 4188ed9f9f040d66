//! Field normalization: raw text records to typed canonical records.
//!
//! Numbers go through the ordered rules in [`numeric`]. Currencies are
//! checked against the configured codes and aliases; a blank currency is
//! inherited from the nearest preceding accepted record. Rows that cannot
//! be normalized are dropped and reported as [`RowError`]s.

pub mod currency;
pub mod numeric;

pub use currency::CurrencyResolver;
pub use numeric::{canonical_string, NumericParser, NumericRule};

use crate::config::{ExtractionConfig, Pattern};
use crate::error::{NumericField, RowError};
use crate::filter::NoiseFilter;
use crate::locate::matching::compact;
use crate::model::{CanonicalRecord, DocumentId, Provenance, RawRecord};

/// Output of [`FieldNormalizer::normalize`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Records in input order
    pub records: Vec<CanonicalRecord>,
    /// One error per dropped record
    pub errors: Vec<RowError>,
}

/// A record waiting for a currency that only the whole table can supply.
struct Pending {
    record: CanonicalRecord,
    aggregate: bool,
}

enum Slot {
    Ready(CanonicalRecord),
    Pending(Pending),
}

/// Normalizes records under one extraction configuration.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    resolver: CurrencyResolver,
    numeric: NumericParser,
    filter: NoiseFilter,
    extract_embedded: bool,
    hint_pattern: Option<Pattern>,
    default_currency: Option<String>,
}

impl FieldNormalizer {
    pub fn new(config: &ExtractionConfig) -> Self {
        let resolver = CurrencyResolver::new(&config.currencies);
        let default_currency = config
            .currencies
            .default
            .as_deref()
            .map(|c| resolver.clean(c))
            .filter(|c| !c.is_empty());
        Self {
            resolver,
            numeric: NumericParser::new(config.numeric_locale),
            filter: NoiseFilter::new(&config.noise),
            extract_embedded: config.currencies.extract_embedded,
            hint_pattern: config.currencies.hint_pattern.clone(),
            default_currency,
        }
    }

    /// Read the table-wide currency from a page heading.
    ///
    /// The pattern is tried against the page text and then against its
    /// whitespace-free lowercase form, since headings are often broken up
    /// by the text layer. The first capture group (or the whole match) must
    /// be a known code.
    pub fn currency_hint(&self, page_text: &str) -> Option<String> {
        let pattern = self.hint_pattern.as_ref()?;
        let candidates = [page_text.to_string(), compact(page_text)];
        candidates
            .iter()
            .filter_map(|text| {
                let caps = pattern.captures(text)?;
                let found = caps.get(1).or_else(|| caps.get(0))?;
                Some(self.resolver.clean(found.as_str()))
            })
            .find(|code| self.resolver.is_known(code))
    }

    /// Normalize records in order.
    ///
    /// `hint` is the table-wide currency found by [`Self::currency_hint`];
    /// it takes precedence over the configured default.
    pub fn normalize(
        &self,
        records: Vec<RawRecord>,
        document_id: &DocumentId,
        hint: Option<&str>,
    ) -> Normalized {
        let mut out = Normalized::default();
        let mut slots: Vec<Slot> = Vec::with_capacity(records.len());
        let mut last: Option<String> = None;
        let mut seen: Vec<(String, usize)> = Vec::new();

        for raw in records {
            let mut name = raw.holding_name.trim().to_string();
            let mut currency = self.resolver.clean(&raw.currency);
            if currency.is_empty() && self.extract_embedded {
                if let Some((rest, code)) = self.resolver.split_embedded(&name) {
                    name = rest;
                    currency = code;
                }
            }
            let aggregate = self.filter.is_aggregate(&name);

            let numbers = self
                .parse_number(&raw.market_value, NumericField::MarketValue, aggregate)
                .and_then(|mv| {
                    self.parse_number(&raw.net_assets, NumericField::NetAssets, aggregate)
                        .map(|na| (mv, na))
                });
            let (market_value, net_assets) = match numbers {
                Ok(values) => values,
                Err(err) => {
                    log::debug!("dropping {:?}: {}", name, err);
                    out.errors.push(err);
                    continue;
                }
            };

            if !currency.is_empty() && !self.resolver.is_known(&currency) {
                if aggregate {
                    currency.clear();
                } else {
                    let err = RowError::UnrecognizedCurrency(currency);
                    log::debug!("dropping {:?}: {}", name, err);
                    out.errors.push(err);
                    continue;
                }
            }

            let mut record = CanonicalRecord {
                holding_name: name,
                currency: String::new(),
                market_value,
                net_assets,
                provenance: Provenance {
                    document_id: document_id.clone(),
                    page: raw.page,
                },
            };

            if !currency.is_empty() {
                match seen.iter_mut().find(|(code, _)| *code == currency) {
                    Some((_, count)) => *count += 1,
                    None => seen.push((currency.clone(), 1)),
                }
                record.currency = currency.clone();
                last = Some(currency);
                slots.push(Slot::Ready(record));
            } else if let Some(previous) = &last {
                record.currency = previous.clone();
                slots.push(Slot::Ready(record));
            } else {
                slots.push(Slot::Pending(Pending { record, aggregate }));
            }
        }

        // Most frequent observed currency; the earliest wins a tie
        let mode = seen
            .iter()
            .fold(None::<&(String, usize)>, |best, entry| match best {
                Some(b) if b.1 >= entry.1 => Some(b),
                _ => Some(entry),
            })
            .map(|(code, _)| code.clone());
        let table_currency = hint
            .map(str::to_string)
            .or_else(|| self.default_currency.clone());

        for slot in slots {
            match slot {
                Slot::Ready(record) => out.records.push(record),
                Slot::Pending(Pending { mut record, aggregate }) => {
                    if let Some(code) = &table_currency {
                        record.currency = code.clone();
                    } else if aggregate {
                        record.currency = mode.clone().unwrap_or_default();
                    } else {
                        let err = RowError::MissingCurrency(record.holding_name);
                        log::debug!("dropping record: {}", err);
                        out.errors.push(err);
                        continue;
                    }
                    out.records.push(record);
                }
            }
        }

        out
    }

    /// Structural aggregates often print only one of the two figures; their
    /// blank cells read as zero.
    fn parse_number(&self, raw: &str, field: NumericField, aggregate: bool) -> Result<f64, RowError> {
        if aggregate && raw.trim().is_empty() {
            return Ok(0.0);
        }
        self.numeric.parse(raw, field)
    }
}
